//! # Selection Frontend
//!
//! Interactive choice of a single document, followed by its export.
//!
//! The frontend owns the listed documents and a small state machine:
//!
//! ```text
//! Browsing --StartFilter--> Filtering --ApplyFilter/CancelFilter--> Browsing
//! Browsing --Confirm(id)--> Downloading --> Terminated
//! any non-terminal --Quit--> Terminated
//! ```
//!
//! Events come from a [`DocumentPicker`]. On `Confirm` the export pipeline
//! runs to completion before the frontend terminates, whatever the outcome
//! of the individual exports.

use crate::directory::DocumentRef;
use crate::error::{ExportError, Result};
use crate::pipeline::{ExportJob, ExportPipeline};
use crate::targets::ExportTarget;
use std::fmt;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    StartFilter,
    ApplyFilter(String),
    CancelFilter,
    Confirm(String),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendState {
    Browsing,
    Filtering,
    Downloading,
    Terminated,
}

impl fmt::Display for FrontendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrontendState::Browsing => "browsing",
            FrontendState::Filtering => "filtering",
            FrontendState::Downloading => "downloading",
            FrontendState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// What the picker is allowed to show
#[derive(Debug)]
pub struct PickerView<'a> {
    pub state: FrontendState,
    pub visible: Vec<&'a DocumentRef>,
    pub filter: Option<&'a str>,
}

/// Source of selection events, usually a terminal.
///
/// Calls block until the user acts.
pub trait DocumentPicker: Send {
    fn next_event(&mut self, view: &PickerView<'_>) -> Result<SelectionEvent>;
}

#[derive(Debug)]
pub enum SelectionOutcome {
    Exported {
        document: DocumentRef,
        jobs: Vec<ExportJob>,
    },
    Quit,
}

enum Step {
    Continue,
    Download(DocumentRef),
    Quit,
}

pub struct SelectionFrontend {
    documents: Vec<DocumentRef>,
    filter: Option<String>,
    state: FrontendState,
    pipeline: ExportPipeline,
    targets: Vec<ExportTarget>,
}

impl SelectionFrontend {
    pub fn new(
        documents: Vec<DocumentRef>,
        pipeline: ExportPipeline,
        targets: Vec<ExportTarget>,
    ) -> Self {
        Self {
            documents,
            filter: None,
            state: FrontendState::Browsing,
            pipeline,
            targets,
        }
    }

    pub fn state(&self) -> FrontendState {
        self.state
    }

    /// Documents matching the current filter, in listing order
    pub fn visible(&self) -> Vec<&DocumentRef> {
        match &self.filter {
            None => self.documents.iter().collect(),
            Some(query) => {
                let query = query.to_lowercase();
                self.documents
                    .iter()
                    .filter(|document| document.display_name.to_lowercase().contains(&query))
                    .collect()
            }
        }
    }

    /// Drive the picker until the user confirms a document or quits
    pub async fn run(mut self, picker: &mut dyn DocumentPicker) -> Result<SelectionOutcome> {
        loop {
            let event = {
                let view = PickerView {
                    state: self.state,
                    visible: self.visible(),
                    filter: self.filter.as_deref(),
                };
                picker.next_event(&view)?
            };

            match self.apply(event) {
                Step::Continue => {}
                Step::Quit => {
                    info!("Selection cancelled");
                    return Ok(SelectionOutcome::Quit);
                }
                Step::Download(document) => {
                    info!(id = %document.id, name = %document.display_name, "Document selected");
                    let jobs = self.pipeline.run(&document.id, &self.targets).await;
                    self.transition(FrontendState::Terminated);
                    return Ok(SelectionOutcome::Exported { document, jobs });
                }
            }
        }
    }

    fn apply(&mut self, event: SelectionEvent) -> Step {
        match (self.state, event) {
            (FrontendState::Downloading | FrontendState::Terminated, event) => {
                debug!(state = %self.state, ?event, "Event ignored");
                Step::Continue
            }
            (_, SelectionEvent::Quit) => {
                self.transition(FrontendState::Terminated);
                Step::Quit
            }
            (FrontendState::Browsing, SelectionEvent::StartFilter) => {
                self.transition(FrontendState::Filtering);
                Step::Continue
            }
            (FrontendState::Filtering, SelectionEvent::ApplyFilter(query)) => {
                let query = query.trim();
                self.filter = (!query.is_empty()).then(|| query.to_string());
                self.transition(FrontendState::Browsing);
                Step::Continue
            }
            (_, SelectionEvent::CancelFilter) => {
                self.filter = None;
                self.transition(FrontendState::Browsing);
                Step::Continue
            }
            (FrontendState::Browsing, SelectionEvent::Confirm(id)) => {
                let selected = self
                    .visible()
                    .into_iter()
                    .find(|document| document.id == id)
                    .cloned();
                match selected {
                    Some(document) => {
                        self.transition(FrontendState::Downloading);
                        Step::Download(document)
                    }
                    None => {
                        warn!(id = %id, "Confirmed document is not in the list");
                        Step::Continue
                    }
                }
            }
            (state, event) => {
                debug!(%state, ?event, "Event ignored");
                Step::Continue
            }
        }
    }

    fn transition(&mut self, next: FrontendState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Selection state changed");
            self.state = next;
        }
    }
}

/// Numbered-list picker over any reader/writer pair.
///
/// In browsing, a number picks that row, `/` starts a filter and `q` quits.
/// While filtering the next line is the query; an empty line clears the filter.
/// End of input counts as quitting.
pub struct ConsolePicker<R, W> {
    reader: R,
    writer: W,
}

impl ConsolePicker<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePicker<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    fn io_error(e: io::Error) -> ExportError {
        ExportError::Picker(e.to_string())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).map_err(Self::io_error)?;
        Ok((read > 0).then(|| line.trim().to_string()))
    }

    fn render(&mut self, view: &PickerView<'_>) -> io::Result<()> {
        writeln!(self.writer)?;
        if let Some(filter) = view.filter {
            writeln!(self.writer, "Filter: {}", filter)?;
        }
        if view.visible.is_empty() {
            writeln!(self.writer, "  (no documents)")?;
        }
        for (index, document) in view.visible.iter().enumerate() {
            writeln!(self.writer, "{:>3}. {}", index + 1, document.display_name)?;
        }
        write!(self.writer, "Select a document [number, / to filter, q to quit]: ")?;
        self.writer.flush()
    }
}

impl<R, W> DocumentPicker for ConsolePicker<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn next_event(&mut self, view: &PickerView<'_>) -> Result<SelectionEvent> {
        if view.state == FrontendState::Filtering {
            write!(self.writer, "Filter: ").map_err(Self::io_error)?;
            self.writer.flush().map_err(Self::io_error)?;
            return Ok(match self.read_line()? {
                None => SelectionEvent::Quit,
                Some(query) if query.is_empty() => SelectionEvent::CancelFilter,
                Some(query) => SelectionEvent::ApplyFilter(query),
            });
        }

        loop {
            self.render(view).map_err(Self::io_error)?;

            let Some(input) = self.read_line()? else {
                return Ok(SelectionEvent::Quit);
            };

            match input.as_str() {
                "" => continue,
                "q" | "quit" => return Ok(SelectionEvent::Quit),
                "/" => return Ok(SelectionEvent::StartFilter),
                _ => {}
            }

            let picked = input
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| view.visible.get(index));

            match picked {
                Some(document) => return Ok(SelectionEvent::Confirm(document.id.clone())),
                None => {
                    writeln!(self.writer, "No document numbered {:?}", input)
                        .map_err(Self::io_error)?;
                }
            }
        }
    }
}
