// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External handler processes for fired timers.
//!
//! Each `name=command` argument becomes one handler: a shell command with a
//! piped stdin that receives newline-terminated `(dn, attribute)` pairs for
//! the life cycle it is named after. Handlers are expected to act and then
//! rewrite the attribute through the directory; nothing is ever read back
//! from them.

use lcm_core::ident::ident_len;
use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};
use thiserror::Error;
use tracing::{debug, error};

/// Why the driver table could not be built.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver argument is not name=command: {0:?}")]
    MalformedArgument(String),
    #[error("failed to spawn handler for {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

struct Driver {
    name: Box<str>,
    child: Child,
    stdin: Option<ChildStdin>,
}

/// Per-environment registry of handler processes, in argument order.
pub(crate) struct DriverTable {
    drivers: Vec<Driver>,
}

impl DriverTable {
    /// Spawn one handler per `name=command` argument.
    pub fn open(args: &[String]) -> Result<Self, DriverError> {
        let mut table = Self {
            drivers: Vec::with_capacity(args.len()),
        };
        for arg in args {
            let (name, rest) = arg.split_at(ident_len(arg));
            let Some(command) = rest.strip_prefix('=') else {
                return Err(DriverError::MalformedArgument(arg.clone()));
            };
            let mut child = Command::new("sh")
                .arg("-c")
                .arg(command)
                .stdin(Stdio::piped())
                .spawn()
                .map_err(|source| DriverError::Spawn {
                    name: name.to_string(),
                    source,
                })?;
            let stdin = child.stdin.take();
            debug!(driver = name, command, "handler started");
            table.drivers.push(Driver {
                name: name.into(),
                child,
                stdin,
            });
        }
        Ok(table)
    }

    /// Write one `(dn, attribute)` pair to the handler named `lifecycle`,
    /// flushing after the pair. Returns `false` when no handler matches.
    ///
    /// A write error counts as delivered: the handler existed, and the feed
    /// is expected to re-deliver through the directory.
    pub fn dispatch(&mut self, lifecycle: &str, dn: &str, attr: &str) -> bool {
        for driver in &mut self.drivers {
            if &*driver.name != lifecycle {
                continue;
            }
            if let Some(stdin) = driver.stdin.as_mut() {
                // One buffer per pair, so the handler never sees half a record.
                let record = format!("{dn}\n{attr}\n");
                let written = stdin
                    .write_all(record.as_bytes())
                    .and_then(|()| stdin.flush());
                if let Err(err) = written {
                    error!(driver = %driver.name, %err, "handler pipe write failed");
                }
            }
            return true;
        }
        false
    }

    /// Close every handler pipe and reap the processes.
    pub fn close(&mut self) {
        for driver in &mut self.drivers {
            drop(driver.stdin.take());
            match driver.child.wait() {
                Ok(status) if !status.success() => {
                    error!(driver = %driver.name, %status, "handler exited with an error");
                }
                Ok(_) => {}
                Err(err) => error!(driver = %driver.name, %err, "failed to reap handler"),
            }
        }
        self.drivers.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.drivers.len()
    }
}

impl Drop for DriverTable {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
