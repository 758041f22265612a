// Output formatting for the inspection binary

use std::io::IsTerminal;

// Colors for terminal output (when supported)
pub const RED: &str = "\x1b[0;31m";
pub const GREEN: &str = "\x1b[0;32m";
pub const YELLOW: &str = "\x1b[1;33m";
pub const CYAN: &str = "\x1b[0;36m";
pub const BOLD: &str = "\x1b[1m";
pub const NC: &str = "\x1b[0m"; // No Color

/// Check if stdout is a terminal (for color output)
#[inline]
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

fn paint(color: &'static str) -> (&'static str, &'static str) {
    if is_terminal() {
        (color, NC)
    } else {
        ("", "")
    }
}

/// Print info message
pub fn info(msg: &str) {
    let (color, reset) = paint(GREEN);
    println!("{}[INFO]{} {}", color, reset, msg);
}

/// Print warning message
pub fn warn(msg: &str) {
    let (color, reset) = paint(YELLOW);
    eprintln!("{}[WARN]{} {}", color, reset, msg);
}

/// Print error message
pub fn error(msg: &str) {
    let (color, reset) = paint(RED);
    eprintln!("{}[ERROR]{} {}", color, reset, msg);
}

/// Print section header
pub fn header(msg: &str) {
    let (bold, reset) = paint(BOLD);
    println!("{}===>{} {}", bold, reset, msg);
    println!();
}

/// Print a `key: value` line under a header
pub fn field(key: &str, value: impl std::fmt::Display) {
    let (color, reset) = paint(CYAN);
    println!("  {}{}:{} {}", color, key, reset, value);
}

/// Exit codes
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_FILE_NOT_FOUND: i32 = 4;
pub const EXIT_VALIDATION: i32 = 5;
pub const EXIT_NOT_FOUND: i32 = 6;

// ============================================================================
// Error Codes and Remediation
// ============================================================================

/// Error codes for JSON error responses
pub const E_INPUT_NOT_FOUND: &str = "E001";
pub const E_METHOD_NOT_FOUND: &str = "E002";
pub const E_INVALID_INPUT: &str = "E003";
pub const E_CFG_ERROR: &str = "E004";
pub const E_INVALID_PATH: &str = "E005";

/// Common remediation messages
pub const R_HINT_LIST_METHODS: &str = "Run 'branchscope registry INPUT' to see the methods in a file";
pub const R_HINT_PATH_FORMAT: &str = "Paths are comma-separated steps, e.g. --path 3:0.5,7,9:2";

/// JSON output wrapper
#[derive(Debug, Clone, serde::Serialize)]
pub struct JsonResponse<T> {
    pub schema_version: String,
    pub execution_id: String,
    pub tool: String,
    pub timestamp: String,
    pub data: T,
}

impl<T: serde::Serialize> JsonResponse<T> {
    pub fn new(data: T) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        let timestamp = chrono::Utc::now().to_rfc3339();
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let exec_id = format!("{:x}-{}", secs, std::process::id());

        JsonResponse {
            schema_version: "1.0.0".to_string(),
            execution_id: exec_id,
            tool: "branchscope".to_string(),
            timestamp,
            data,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Error response format for JSON mode
#[derive(Debug, Clone, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl JsonError {
    pub fn new(category: &str, message: &str, code: &str) -> Self {
        JsonError {
            error: category.to_string(),
            message: message.to_string(),
            code: code.to_string(),
            remediation: None,
        }
    }

    pub fn with_remediation(mut self, remediation: &str) -> Self {
        self.remediation = Some(remediation.to_string());
        self
    }

    pub fn input_not_found(path: &str) -> Self {
        Self::new(
            "InputNotFound",
            &format!("Input file not found: {}", path),
            E_INPUT_NOT_FOUND,
        )
    }

    pub fn method_not_found(name: &str) -> Self {
        Self::new(
            "MethodNotFound",
            &format!("Method '{}' not found in input", name),
            E_METHOD_NOT_FOUND,
        )
        .with_remediation(R_HINT_LIST_METHODS)
    }

    pub fn invalid_input(message: &str) -> Self {
        Self::new("InvalidInput", message, E_INVALID_INPUT)
    }

    pub fn cfg_error(message: &str) -> Self {
        Self::new("CfgError", message, E_CFG_ERROR)
    }

    pub fn invalid_path(message: &str) -> Self {
        Self::new("InvalidPath", message, E_INVALID_PATH).with_remediation(R_HINT_PATH_FORMAT)
    }
}
