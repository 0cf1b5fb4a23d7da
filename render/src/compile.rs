use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;

use latex_common::Result;
use latex_common::ServiceError;
use latex_sandboxfs::OpenMode;
use latex_sandboxfs::SandboxFs;
use latex_session::Compiler;
use latex_session::ConvertSpec;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;
use tracing::info;

/// Documented safety cap on the fixed-point compile loop (§4.6 step 3).
const MAX_COMPILE_ATTEMPTS: u32 = 5;

/// The substring the compiler's own log emits when cross-reference
/// convergence requires another pass.
const RERUN_SIGNAL: &str = "Rerun";

pub struct CompileOutcome {
    pub success: bool,
    pub log_path: String,
    pub product_path: Option<String>,
}

/// Drives `compiler` to a fixed point over `target`, reading `<key>.log`
/// after every pass. `cwd` is the session's `source/` directory; this is
/// the Renderer's compiler contact surface with the filesystem.
pub async fn compile_to_fixed_point(
    source: &SandboxFs,
    session_key: &str,
    compiler: Compiler,
    target: &str,
) -> Result<CompileOutcome> {
    let cwd = source.root_path();
    let log_name = format!("{session_key}.log");
    let product_name = format!("{session_key}.pdf");

    let mut attempt = 0;
    loop {
        attempt += 1;
        run_compiler(cwd, compiler, session_key, target).await?;

        let log_contents = read_text_if_present(source, &log_name).await?;
        let needs_rerun = should_rerun(log_contents.as_deref());
        debug!(session = session_key, attempt, needs_rerun, "compile pass");

        if !needs_rerun || attempt >= MAX_COMPILE_ATTEMPTS {
            break;
        }
    }

    let success = source.exists(&product_name)?;
    info!(session = session_key, attempt, success, "compile loop finished");

    Ok(CompileOutcome {
        success,
        log_path: cwd.join(&log_name).display().to_string(),
        product_path: success.then(|| cwd.join(&product_name).display().to_string()),
    })
}

async fn run_compiler(
    cwd: &std::path::Path,
    compiler: Compiler,
    session_key: &str,
    target: &str,
) -> Result<()> {
    let status = Command::new(compiler.binary_name())
        .arg("-interaction=nonstopmode")
        .arg(format!("-jobname={session_key}"))
        .arg(target)
        .current_dir(cwd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    // Typesetting toolchains may exit non-zero even when they produce usable
    // output (e.g. on recoverable warnings), so the exit status is
    // deliberately not treated as authoritative here.
    debug!(session = session_key, ?status, "compiler process exited");
    Ok(())
}

/// Whether the compile loop must run another pass: absent log is treated
/// as "keep going" (the compiler may not have flushed it yet on attempt 1
/// in some toolchains), present log decides on the `Rerun` substring alone.
fn should_rerun(log_contents: Option<&str>) -> bool {
    match log_contents {
        Some(body) => body.contains(RERUN_SIGNAL),
        None => true,
    }
}

/// Pure diffing step of rasterization: the single path present in `after`
/// but not `before`, or an error describing why there wasn't exactly one.
fn find_new_file<'a>(
    before: &HashSet<PathBuf>,
    after: &'a HashSet<PathBuf>,
) -> Result<&'a PathBuf> {
    let mut new_files: Vec<&PathBuf> = after.difference(before).collect();
    new_files.sort();
    match new_files.as_slice() {
        [single] => Ok(single),
        [] => Err(ServiceError::CompileFailure(
            "rasterization produced no new file".into(),
        )),
        _ => Err(ServiceError::CompileFailure(format!(
            "rasterization produced {} new files, expected exactly one",
            new_files.len()
        ))),
    }
}

async fn read_text_if_present(fs: &SandboxFs, relative: &str) -> Result<Option<String>> {
    if !fs.exists(relative)? {
        return Ok(None);
    }
    let mut handle = fs.open(relative, OpenMode::Read).await?;
    let mut contents = String::new();
    handle.read_to_string(&mut contents).await?;
    Ok(Some(contents))
}

/// Rasterizes the compiled product via `pdftoppm` (§4.6 step 4). Returns the
/// relative path of the single new file produced, failing if the directory
/// diff does not contain exactly one new entry.
pub async fn rasterize(
    source: &SandboxFs,
    product_path: &str,
    convert: ConvertSpec,
) -> Result<PathBuf> {
    let cwd = source.root_path();
    let product_name = PathBuf::from(product_path)
        .file_name()
        .ok_or_else(|| ServiceError::Fatal("product path has no file name".into()))?
        .to_string_lossy()
        .into_owned();
    let basename = product_name
        .strip_suffix(".pdf")
        .unwrap_or(&product_name)
        .to_string();

    let before: HashSet<PathBuf> = source.get_all_files(".").await?.into_iter().collect();

    let status = Command::new("pdftoppm")
        .arg("-singlefile")
        .arg(format!("-{}", convert.format.as_str()))
        .arg("-r")
        .arg(convert.dpi.to_string())
        .arg(&product_name)
        .arg(&basename)
        .current_dir(cwd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    debug!(?status, "rasterizer process exited");

    let after: HashSet<PathBuf> = source.get_all_files(".").await?.into_iter().collect();
    find_new_file(&before, &after).cloned()
}
