//! Sink-backed `console`

use parking_lot::Mutex;

use crate::context::Context;
use crate::convert;
use crate::error::VmResult;
use crate::intrinsics::{install_namespace, method};
use crate::value::Value;

/// Severity of a console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    /// `console.debug`
    Debug,
    /// `console.log` / `console.info`
    Info,
    /// `console.warn`
    Warn,
    /// `console.error`
    Error,
}

/// Where console output goes. The embedder swaps the sink; the default
/// forwards to `tracing`.
pub trait ConsoleSink: Send + Sync {
    /// Receive one rendered console line.
    fn write(&self, level: ConsoleLevel, message: &str);
}

/// Default sink: forward to the `tracing` subscriber.
pub struct TracingSink;

impl ConsoleSink for TracingSink {
    fn write(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Debug => tracing::debug!(target: "marten::console", "{message}"),
            ConsoleLevel::Info => tracing::info!(target: "marten::console", "{message}"),
            ConsoleLevel::Warn => tracing::warn!(target: "marten::console", "{message}"),
            ConsoleLevel::Error => tracing::error!(target: "marten::console", "{message}"),
        }
    }
}

/// Capturing sink for tests and embedders that collect output.
#[derive(Default)]
pub struct BufferSink {
    lines: Mutex<Vec<(ConsoleLevel, String)>>,
}

impl BufferSink {
    /// Create an empty buffer sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything captured so far.
    pub fn drain(&self) -> Vec<(ConsoleLevel, String)> {
        std::mem::take(&mut self.lines.lock())
    }
}

impl ConsoleSink for BufferSink {
    fn write(&self, level: ConsoleLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}

/// Install `console`.
pub fn install(cx: &mut Context) {
    let console = install_namespace(cx, "console");
    method(cx, &console, "log", 0, console_log);
    method(cx, &console, "info", 0, console_log);
    method(cx, &console, "debug", 0, console_debug);
    method(cx, &console, "warn", 0, console_warn);
    method(cx, &console, "error", 0, console_error);
}

fn render(cx: &mut Context, args: &[Value]) -> String {
    args.iter()
        .map(|v| convert::display_value(cx, v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn emit(cx: &mut Context, level: ConsoleLevel, args: &[Value]) -> VmResult<Value> {
    let message = render(cx, args);
    cx.console_sink().write(level, &message);
    Ok(Value::Undefined)
}

fn console_log(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    emit(cx, ConsoleLevel::Info, args)
}

fn console_debug(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    emit(cx, ConsoleLevel::Debug, args)
}

fn console_warn(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    emit(cx, ConsoleLevel::Warn, args)
}

fn console_error(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    emit(cx, ConsoleLevel::Error, args)
}
