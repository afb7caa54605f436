//! Debug Adapter Protocol vocabulary.
//!
//! These are the argument and body shapes exchanged with a debug adapter.
//! The transport never looks inside them: requests carry arguments as
//! opaque JSON and responses/events are decoded into these types on demand.
//! Field names follow the protocol's camelCase wire names.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known command names.
pub mod commands {
    pub const INITIALIZE: &str = "initialize";
    pub const LAUNCH: &str = "launch";
    pub const ATTACH: &str = "attach";
    pub const CONFIGURATION_DONE: &str = "configurationDone";
    pub const DISCONNECT: &str = "disconnect";
    pub const SET_BREAKPOINTS: &str = "setBreakpoints";
    pub const THREADS: &str = "threads";
    pub const STACK_TRACE: &str = "stackTrace";
    pub const SCOPES: &str = "scopes";
    pub const VARIABLES: &str = "variables";
    pub const EVALUATE: &str = "evaluate";
    pub const CONTINUE: &str = "continue";
}

// ---------------------------------------------------------------------------
// initialize
// ---------------------------------------------------------------------------

/// Arguments of the `initialize` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequestArguments {
    /// Identifier of the adapter this client talks to.
    #[serde(rename = "adapterID")]
    pub adapter_id: String,

    #[serde(rename = "clientID", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Line numbers are 1-based when true.
    pub lines_start_at1: bool,

    /// Column numbers are 1-based when true.
    pub columns_start_at1: bool,

    /// `"path"` or `"uri"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_format: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub supports_variable_type: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub supports_run_in_terminal_request: bool,
}

impl InitializeRequestArguments {
    /// Creates arguments for the given adapter with 1-based lines and columns.
    pub fn new(adapter_id: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            client_id: Some("dapwire".to_string()),
            client_name: Some("dapwire".to_string()),
            locale: None,
            lines_start_at1: true,
            columns_start_at1: true,
            path_format: Some("path".to_string()),
            supports_variable_type: false,
            supports_run_in_terminal_request: false,
        }
    }

    /// Builder: set the locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// Exception filter advertised by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionBreakpointsFilter {
    pub filter: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

/// Features supported by a debug adapter, carried in the body of the
/// `initialize` response.
///
/// Flags this type does not name are preserved in [`Capabilities::other`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub supports_configuration_done_request: bool,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub supports_function_breakpoints: bool,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub supports_conditional_breakpoints: bool,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub supports_evaluate_for_hovers: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exception_breakpoint_filters: Vec<ExceptionBreakpointsFilter>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Capabilities {
    /// Returns an adapter flag by its wire name, including flags not
    /// modelled as fields.
    pub fn flag(&self, name: &str) -> bool {
        match name {
            "supportsConfigurationDoneRequest" => self.supports_configuration_done_request,
            "supportsFunctionBreakpoints" => self.supports_function_breakpoints,
            "supportsConditionalBreakpoints" => self.supports_conditional_breakpoints,
            "supportsEvaluateForHovers" => self.supports_evaluate_for_hovers,
            other => self
                .other
                .get(other)
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

// ---------------------------------------------------------------------------
// launch
// ---------------------------------------------------------------------------

/// Arguments of the `launch` request.
///
/// Adapters accept many implementation-specific keys; anything beyond the
/// common ones goes into `extra` and is sent verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequestArguments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_debug: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LaunchRequestArguments {
    /// Creates launch arguments for a program.
    pub fn program(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
            ..Default::default()
        }
    }

    /// Builder: set the working directory.
    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Builder: append a program argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Builder: set an adapter-specific key.
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A structured error message, as found in error response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    /// Message text; `{name}` placeholders are filled from `variables`.
    pub format: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_user: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_telemetry: Option<bool>,
}

impl Message {
    /// Creates a message without variables.
    pub fn new(id: i64, format: impl Into<String>) -> Self {
        Self {
            id,
            format: format.into(),
            variables: BTreeMap::new(),
            show_user: None,
            send_telemetry: None,
        }
    }

    /// Builder: add a substitution variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Renders the format string, replacing known `{name}` placeholders.
    /// Unknown placeholders are left as written.
    pub fn render(&self) -> String {
        let mut out = self.format.clone();
        for (name, value) in &self.variables {
            out = out.replace(&format!("{{{}}}", name), value);
        }
        out
    }
}

/// A source file or buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub source_reference: i64,
}

impl Source {
    /// Creates a source from a filesystem path, named after its file name.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self {
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            path: Some(path.to_string_lossy().into_owned()),
            source_reference: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub line: i64,
    pub column: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub name: String,
    pub variables_reference: i64,
    #[serde(default)]
    pub expensive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub variables_reference: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub name: String,
}

impl Thread {
    /// Creates a thread, naming it `Thread #<id>` when `name` is empty.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        let name = name.into();
        let name = if name.is_empty() {
            format!("Thread #{}", id)
        } else {
            name
        };
        Self { id, name }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Body of an unsuccessful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponseBody {
    #[serde(default)]
    pub stack_frames: Vec<StackFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopesResponseBody {
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariablesResponseBody {
    #[serde(default)]
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadsResponseBody {
    #[serde(default)]
    pub threads: Vec<Thread>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponseBody {
    pub result: String,
    #[serde(default)]
    pub variables_reference: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBreakpointsResponseBody {
    #[serde(default)]
    pub breakpoints: Vec<Breakpoint>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Classification of well-known event names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Initialized,
    Stopped,
    Continued,
    Exited,
    Terminated,
    Thread,
    Output,
    Breakpoint,
    Module,
    /// Any event name not listed above.
    Other(String),
}

impl EventKind {
    /// Classifies an event by its wire name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "initialized" => Self::Initialized,
            "stopped" => Self::Stopped,
            "continued" => Self::Continued,
            "exited" => Self::Exited,
            "terminated" => Self::Terminated,
            "thread" => Self::Thread,
            "output" => Self::Output,
            "breakpoint" => Self::Breakpoint,
            "module" => Self::Module,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true for events after which the debuggee is gone.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Terminated | Self::Exited)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitedEventBody {
    pub exit_code: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEventBody {
    pub reason: String,
    pub thread_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEventBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initialize_arguments_wire_names() {
        let args = InitializeRequestArguments::new("coreclr");
        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(value["adapterID"], "coreclr");
        assert_eq!(value["clientID"], "dapwire");
        assert_eq!(value["linesStartAt1"], true);
        assert_eq!(value["pathFormat"], "path");
        assert!(value.get("supportsVariableType").is_none());
    }

    #[test]
    fn capabilities_from_empty_object() {
        let caps: Capabilities = serde_json::from_value(json!({})).unwrap();
        assert_eq!(caps, Capabilities::default());
    }

    #[test]
    fn capabilities_keep_unknown_flags() {
        let caps: Capabilities = serde_json::from_value(json!({
            "supportsConfigurationDoneRequest": true,
            "supportsStepBack": true,
            "exceptionBreakpointFilters": [
                { "filter": "all", "label": "All Exceptions" },
                { "filter": "user-unhandled", "label": "User-Unhandled", "default": true }
            ]
        }))
        .unwrap();

        assert!(caps.supports_configuration_done_request);
        assert!(!caps.supports_function_breakpoints);
        assert!(caps.flag("supportsStepBack"));
        assert!(caps.flag("supportsConfigurationDoneRequest"));
        assert!(!caps.flag("supportsRestartFrame"));
        assert_eq!(caps.exception_breakpoint_filters.len(), 2);
        assert_eq!(caps.exception_breakpoint_filters[1].default, Some(true));
    }

    #[test]
    fn launch_arguments_flatten_extra_keys() {
        let args = LaunchRequestArguments::program("/bin/hello")
            .cwd("/tmp")
            .arg("--verbose")
            .extra("stopAtEntry", json!(true));
        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(
            value,
            json!({
                "program": "/bin/hello",
                "cwd": "/tmp",
                "args": ["--verbose"],
                "stopAtEntry": true
            })
        );
    }

    #[test]
    fn message_render_substitutes_variables() {
        let message = Message::new(1001, "cannot find {file} in {dir}")
            .with_variable("file", "main.rs")
            .with_variable("dir", "/src");
        assert_eq!(message.render(), "cannot find main.rs in /src");

        let partial = Message::new(1, "missing {what}");
        assert_eq!(partial.render(), "missing {what}");
    }

    #[test]
    fn thread_default_name() {
        assert_eq!(Thread::new(7, "").name, "Thread #7");
        assert_eq!(Thread::new(7, "main").name, "main");
    }

    #[test]
    fn source_from_path_uses_file_name() {
        let source = Source::from_path("/home/user/project/main.rs");
        assert_eq!(source.name.as_deref(), Some("main.rs"));
        assert_eq!(source.path.as_deref(), Some("/home/user/project/main.rs"));
        assert_eq!(source.source_reference, 0);
    }

    #[test]
    fn event_kind_classification() {
        assert_eq!(EventKind::from_name("stopped"), EventKind::Stopped);
        assert!(EventKind::from_name("terminated").ends_session());
        assert!(EventKind::from_name("exited").ends_session());
        assert!(!EventKind::from_name("output").ends_session());
        assert_eq!(
            EventKind::from_name("progressStart"),
            EventKind::Other("progressStart".to_string())
        );
    }

    #[test]
    fn stack_trace_body_snapshot() {
        let body = StackTraceResponseBody {
            stack_frames: vec![StackFrame {
                id: 1,
                name: "main".to_string(),
                source: Some(Source::from_path("/src/main.rs")),
                line: 12,
                column: 5,
            }],
            total_frames: Some(1),
        };
        insta::assert_json_snapshot!("stack_trace_body", body);
    }
}
