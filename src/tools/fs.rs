//! Filesystem capabilities
//!
//! All paths are model-supplied and relative to the [`WorkingDir`]. Errors
//! are rendered into the returned text.

use super::{ToolOutput, WorkingDir};

/// `list_entries`: names in a directory, sorted, directories suffixed with `/`
pub async fn list_entries(dir: &WorkingDir, path: &str) -> ToolOutput {
    let full_path = match dir.resolve(path) {
        Ok(p) => p,
        Err(e) => return ToolOutput::rejected(&e),
    };

    match tokio::fs::metadata(&full_path).await {
        Ok(meta) if !meta.is_dir() => {
            return ToolOutput::failed(format!("Not a directory: {}", path));
        }
        Ok(_) => {}
        Err(_) => return ToolOutput::failed(format!("Directory does not exist: {}", path)),
    }

    let mut reader = match tokio::fs::read_dir(&full_path).await {
        Ok(r) => r,
        Err(e) => return ToolOutput::failed(format!("Error listing {}: {}", path, e)),
    };

    let mut names = Vec::new();
    loop {
        match reader.next_entry().await {
            Ok(Some(entry)) => {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    name.push('/');
                }
                names.push(name);
            }
            Ok(None) => break,
            Err(e) => return ToolOutput::failed(format!("Error listing {}: {}", path, e)),
        }
    }

    if names.is_empty() {
        return ToolOutput::success("Directory is empty");
    }
    names.sort();
    ToolOutput::success(names.join("\n"))
}

/// `read_text_file`: whole file as UTF-8 text
pub async fn read_text_file(dir: &WorkingDir, filename: &str) -> ToolOutput {
    let full_path = match dir.resolve(filename) {
        Ok(p) => p,
        Err(e) => return ToolOutput::rejected(&e),
    };

    match tokio::fs::read_to_string(&full_path).await {
        Ok(content) => ToolOutput::success(content),
        Err(e) => ToolOutput::failed(format!("Error reading {}: {}", filename, e)),
    }
}

/// `make_directory`: create with parents; an existing directory is success
pub async fn make_directory(dir: &WorkingDir, path: &str) -> ToolOutput {
    let full_path = match dir.resolve(path) {
        Ok(p) => p,
        Err(e) => return ToolOutput::rejected(&e),
    };

    match tokio::fs::create_dir_all(&full_path).await {
        Ok(()) => ToolOutput::success(format!("Successfully created directory {}", path)),
        Err(e) => ToolOutput::failed(format!("Error creating directory {}: {}", path, e)),
    }
}

/// `write_text_file`: replace contents, creating missing parent directories
pub async fn write_text_file(dir: &WorkingDir, filename: &str, content: &str) -> ToolOutput {
    let full_path = match dir.resolve(filename) {
        Ok(p) => p,
        Err(e) => return ToolOutput::rejected(&e),
    };

    if full_path == dir.root() {
        return ToolOutput::failed(format!("Error writing {}: not a file path", filename));
    }

    if let Some(parent) = full_path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return ToolOutput::failed(format!("Error writing {}: {}", filename, e));
        }
    }

    match tokio::fs::write(&full_path, content).await {
        Ok(()) => ToolOutput::success(format!(
            "Successfully wrote {} bytes to {}",
            content.len(),
            filename
        )),
        Err(e) => ToolOutput::failed(format!("Error writing {}: {}", filename, e)),
    }
}
