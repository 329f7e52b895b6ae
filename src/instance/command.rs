//! Argument vector assembly for one process run.

use crate::options::split_extra_options;

use super::InstanceSettings;

/// Builds `[binary, global..., -d out, --download-archive file,
/// --filter expr, extra..., urls...]`, omitting options whose values are
/// empty.
#[must_use]
pub fn build_command(
    binary: &str,
    global_tokens: &[String],
    settings: &InstanceSettings,
    urls: &[String],
) -> Vec<String> {
    let mut argv = Vec::with_capacity(8 + global_tokens.len() + urls.len());
    argv.push(binary.to_string());
    argv.extend(global_tokens.iter().cloned());

    let output_dir = settings.output_dir.trim();
    if !output_dir.is_empty() {
        argv.push("-d".to_string());
        argv.push(output_dir.to_string());
    }

    let archive = settings.archive_file.trim();
    if !archive.is_empty() {
        argv.push("--download-archive".to_string());
        argv.push(archive.to_string());
    }

    if let Some(filter) = settings.filter_expression() {
        argv.push("--filter".to_string());
        argv.push(filter);
    }

    argv.extend(split_extra_options(&settings.extra_opts));
    argv.extend(urls.iter().cloned());
    argv
}

/// Renders `argv` for logs, quoting tokens that need it.
#[must_use]
pub fn display_command(argv: &[String]) -> String {
    shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "))
}
