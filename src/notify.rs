//! Best-effort desktop notification when a timer completes

use std::io::Write;

/// Fire a desktop notification and ring the terminal bell.
///
/// Everything here is best-effort; a missing notification tool must never
/// fail the command that triggered it.
pub fn send_completion(title: &str, message: &str) {
    platform_notify(title, message);

    // Terminal bell as the lowest common denominator.
    print!("\u{7}");
    let _ = std::io::stdout().flush();
}

#[cfg(target_os = "macos")]
fn platform_notify(title: &str, message: &str) {
    let script = format!(
        r#"display notification "{}" with title "{}""#,
        message, title
    );
    if let Err(e) = std::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
    {
        tracing::debug!("osascript failed: {}", e);
    }
}

#[cfg(target_os = "linux")]
fn platform_notify(title: &str, message: &str) {
    if let Err(e) = std::process::Command::new("notify-send")
        .arg(title)
        .arg(message)
        .output()
    {
        tracing::debug!("notify-send failed: {}", e);
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn platform_notify(_title: &str, _message: &str) {}
