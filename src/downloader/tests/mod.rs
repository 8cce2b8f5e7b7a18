//! Download manager behavior tests, grouped by operation.

use std::sync::Arc;
use std::time::Duration;

use super::test_helpers::*;
use crate::config::PartialFileAction;
use crate::error::{DownloadError, Error, ErrorKind};
use crate::filename;
use crate::providers::NoLyrics;
use crate::types::{Event, Quality, Status, TaskId, status_text};

mod failures;
mod queue;
