//! Embedded pages shown through an external viewer process.
//!
//! The viewer (typically a kiosk-mode browser) runs as its own process, so
//! the page is isolated from the player. At most one viewer runs at a time.

use anyhow::{bail, Context, Result};
use tokio::process::{Child, Command};

/// Launches and tears down the page viewer.
#[derive(Debug)]
pub struct PageViewer {
    template: Option<String>,
    child: Option<Child>,
    url: Option<String>,
}

impl PageViewer {
    /// `template` is a command line with a `{url}` placeholder. Without one,
    /// pages are skipped with a warning.
    pub fn new(template: Option<String>) -> Self {
        Self {
            template,
            child: None,
            url: None,
        }
    }

    /// Show `url`, replacing any page already on screen.
    pub fn show(&mut self, url: &str) -> Result<()> {
        if self.url.as_deref() == Some(url) && self.child.is_some() {
            return Ok(());
        }
        self.hide();

        let Some(template) = self.template.as_deref() else {
            tracing::warn!("No page_command configured, cannot show {}", url);
            return Ok(());
        };
        let argv = command_line(template, url)?;
        tracing::info!("Opening page viewer: {}", argv.join(" "));

        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start page viewer '{}'", argv[0]))?;
        self.child = Some(child);
        self.url = Some(url.to_string());
        Ok(())
    }

    /// Close the viewer if one is open.
    pub fn hide(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!("Page viewer already gone: {}", e);
            }
        }
        self.url = None;
    }

    pub fn is_showing(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for PageViewer {
    fn drop(&mut self) {
        self.hide();
    }
}

/// Split the template on whitespace and substitute `{url}`.
///
/// The URL is appended when the template has no placeholder.
pub fn command_line(template: &str, url: &str) -> Result<Vec<String>> {
    let mut argv: Vec<String> = template
        .split_whitespace()
        .map(|arg| arg.replace("{url}", url))
        .collect();
    if argv.is_empty() {
        bail!("page_command is empty");
    }
    if !template.contains("{url}") {
        argv.push(url.to_string());
    }
    Ok(argv)
}
