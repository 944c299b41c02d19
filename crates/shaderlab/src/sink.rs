use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use engine::ExportSink;

/// Sends copies to the system clipboard and downloads into one directory.
pub struct DesktopSink {
    export_dir: PathBuf,
    clipboard: Option<arboard::Clipboard>,
}

impl DesktopSink {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
            clipboard: None,
        }
    }

    fn clipboard(&mut self) -> Result<&mut arboard::Clipboard> {
        if self.clipboard.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|err| anyhow!("clipboard unavailable: {err}"))?;
            self.clipboard = Some(clipboard);
        }
        self.clipboard
            .as_mut()
            .ok_or_else(|| anyhow!("clipboard unavailable"))
    }
}

impl ExportSink for DesktopSink {
    fn copy_text(&mut self, text: &str) -> Result<()> {
        self.clipboard()?
            .set_text(text.to_string())
            .map_err(|err| anyhow!("failed to write clipboard: {err}"))
    }

    fn save_file(&mut self, file_name: &str, contents: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.export_dir).with_context(|| {
            format!(
                "failed to create export directory {}",
                self.export_dir.display()
            )
        })?;
        let path = self.export_dir.join(file_name);
        fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
