use std::io::Write;
use std::process::{Command, Stdio};
use anyhow::{Result, anyhow};

/// Clipboard helpers tried in order: macOS, Wayland, X11
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

pub fn copy_to_clipboard(text: &str) -> Result<()> {
    for (program, args) in CLIPBOARD_COMMANDS {
        let Ok(mut child) = Command::new(program)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        else {
            continue;
        };

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }

        if child.wait()?.success() {
            tracing::debug!(program, bytes = text.len(), "Copied to clipboard");
            return Ok(());
        }
    }

    Err(anyhow!("No clipboard command available (tried pbcopy, wl-copy, xclip, xsel)"))
}
