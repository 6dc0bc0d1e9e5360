//! Recorded gaze traces in JSON-lines form.
//!
//! ```text
//! {"op":"element","id":1,"kind":"button","max_dwell_repeat_count":2}
//! {"op":"gaze","t_ms":0,"hit":1}
//! {"op":"gaze","t_ms":16}
//! {"op":"destroy","id":1}
//! {"op":"profile","name":"typing"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use log::info;
use serde::Deserialize;
use std::io::BufRead;
use thiserror::Error;

use crate::actions::Actuator;
use crate::config::Profile;
use crate::driver::{DwellDriver, GazeSample};
use crate::element::{Element, ElementId};
use crate::feedback::ProgressSink;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),
    #[error("trace line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("trace line {line}: cannot switch to profile '{name}': {source}")]
    Profile {
        line: usize,
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum TraceRecord {
    Element(Element),
    Gaze {
        t_ms: u64,
        #[serde(default)]
        hit: Option<ElementId>,
    },
    Destroy {
        id: ElementId,
    },
    /// Switch timing profile; trackers pick it up on their next entry.
    Profile {
        name: String,
    },
}

pub struct TraceReader<R> {
    inner: R,
    line_no: usize,
    buf: String,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_no: 0,
            buf: String::new(),
        }
    }

    /// Line number of the last record returned.
    pub fn line(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<TraceRecord, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_no += 1;
            let line = self.buf.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return Some(serde_json::from_str(line).map_err(|source| TraceError::Parse {
                line: self.line_no,
                source,
            }));
        }
    }
}

/// Feed every record into the driver. `load_profile` resolves the names of
/// profile switches. Returns the number of gaze samples.
pub fn replay<R, S, A, F>(
    reader: R,
    driver: &mut DwellDriver<S, A>,
    mut load_profile: F,
) -> Result<usize, TraceError>
where
    R: BufRead,
    S: ProgressSink,
    A: Actuator,
    F: FnMut(&str) -> anyhow::Result<Profile>,
{
    let mut samples = 0;
    let mut records = TraceReader::new(reader);
    while let Some(record) = records.next() {
        match record? {
            TraceRecord::Element(element) => driver.declare(element),
            TraceRecord::Gaze { t_ms, hit } => {
                driver.process(GazeSample::at_ms(t_ms, hit.map(|id| id.0)));
                samples += 1;
            }
            TraceRecord::Destroy { id } => driver.destroy(id),
            TraceRecord::Profile { name } => {
                let profile = load_profile(&name).map_err(|source| TraceError::Profile {
                    line: records.line(),
                    name: name.clone(),
                    source,
                })?;
                info!("switching to profile '{name}' after {samples} samples");
                driver.set_profile(profile);
            }
        }
    }
    Ok(samples)
}
