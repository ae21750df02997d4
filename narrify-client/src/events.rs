//! Event types for the shell loop.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    /// One line typed on stdin.
    Line(String),
    /// The session may have changed; re-read it.
    AuthChanged,
    /// The feed search committed a new value.
    SearchCommitted(String),
    InputClosed,
}
