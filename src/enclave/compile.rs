// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! WAT to WASM compilation.
//!
//! The default compiler shells out to `wat2wasm` through a pair of randomly
//! named scratch files; the builtin compiler uses the `wat` crate in-process.
//! Both take processed (already injected) text.

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

use crate::config::CompilerConfig;
use crate::errors::{ExecutionError, ExecutionResult};
use crate::observability::messages::enclave::ScratchCleanupFailed;

pub trait WatCompiler: Send + Sync {
    fn compile(&self, wat: &str) -> ExecutionResult<Vec<u8>>;

    fn name(&self) -> &str;
}

pub fn create_compiler(config: &CompilerConfig) -> Box<dyn WatCompiler> {
    match config {
        CompilerConfig::Builtin => Box::new(BuiltinCompiler),
        CompilerConfig::External {
            program,
            args,
            scratch_dir,
        } => Box::new(ExternalCompiler {
            program: program.clone(),
            args: args.clone(),
            scratch_dir: scratch_dir.clone(),
        }),
    }
}

pub struct BuiltinCompiler;

impl WatCompiler for BuiltinCompiler {
    fn compile(&self, wat: &str) -> ExecutionResult<Vec<u8>> {
        wat::parse_str(wat).map_err(|e| ExecutionError::CompileError(e.to_string()))
    }

    fn name(&self) -> &str {
        "builtin"
    }
}

/// Runs `<program> <args..> <input.wat> -o <output.wasm>`.
pub struct ExternalCompiler {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub scratch_dir: Option<PathBuf>,
}

impl WatCompiler for ExternalCompiler {
    fn compile(&self, wat: &str) -> ExecutionResult<Vec<u8>> {
        let scratch = ScratchFiles::create(self.scratch_dir.as_deref())?;
        let outcome = scratch.compile(&self.program, &self.args, wat);
        scratch.release();
        outcome
    }

    fn name(&self) -> &str {
        self.program.to_str().unwrap_or("external")
    }
}

/// Input and output paths for one compiler run. Both are removed by
/// `release`, or by `NamedTempFile`'s drop if we unwind first.
struct ScratchFiles {
    source: NamedTempFile,
    output: NamedTempFile,
}

impl ScratchFiles {
    fn create(dir: Option<&Path>) -> ExecutionResult<Self> {
        Ok(Self {
            source: scratch_file(dir, ".wat")?,
            output: scratch_file(dir, ".wasm")?,
        })
    }

    fn compile(&self, program: &Path, args: &[String], wat: &str) -> ExecutionResult<Vec<u8>> {
        std::fs::write(self.source.path(), wat).map_err(|e| {
            ExecutionError::CompileError(format!("failed to write WAT file: {}", e))
        })?;

        let run = Command::new(program)
            .args(args)
            .arg(self.source.path())
            .arg("-o")
            .arg(self.output.path())
            .output()
            .map_err(|e| {
                ExecutionError::CompileError(format!(
                    "failed to run {}: {}",
                    program.display(),
                    e
                ))
            })?;

        if !run.status.success() {
            let mut diagnostics = String::from_utf8_lossy(&run.stdout).into_owned();
            diagnostics.push_str(&String::from_utf8_lossy(&run.stderr));
            return Err(ExecutionError::CompileError(format!(
                "{} compilation failed ({}): {}",
                program.display(),
                run.status,
                diagnostics.trim()
            )));
        }

        let wasm = std::fs::read(self.output.path()).map_err(|e| {
            ExecutionError::CompileError(format!("failed to read compiled WASM file: {}", e))
        })?;
        if wasm.is_empty() {
            return Err(ExecutionError::CompileError(format!(
                "{} produced no output",
                program.display()
            )));
        }
        Ok(wasm)
    }

    fn release(self) {
        for file in [self.source, self.output] {
            let path = file.path().display().to_string();
            if let Err(error) = file.close() {
                tracing::warn!(
                    "{}",
                    ScratchCleanupFailed {
                        path: &path,
                        error: &error,
                    }
                );
            }
        }
    }
}

fn scratch_file(dir: Option<&Path>, suffix: &str) -> ExecutionResult<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("enclave-").suffix(suffix);
    let file = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    };
    file.map_err(|e| ExecutionError::CompileError(format!("failed to create scratch file: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE_WAT: &str = r#"(module (func (export "square") (param i32) (result i32) local.get 0 local.get 0 i32.mul))"#;

    #[test]
    fn test_builtin_compiles_wat() {
        let wasm = BuiltinCompiler.compile(SQUARE_WAT).unwrap();
        assert_eq!(&wasm[0..4], b"\0asm");
    }

    #[test]
    fn test_builtin_reports_syntax_errors() {
        let error = BuiltinCompiler.compile("(module (func (export \"f\") i32.bogus))").unwrap_err();
        assert!(matches!(error, ExecutionError::CompileError(_)));
    }

    #[test]
    fn test_missing_program_is_a_compile_error() {
        let scratch = tempfile::tempdir().unwrap();
        let compiler = ExternalCompiler {
            program: PathBuf::from("/nonexistent/wat2wasm"),
            args: vec![],
            scratch_dir: Some(scratch.path().to_path_buf()),
        };

        let error = compiler.compile(SQUARE_WAT).unwrap_err();
        assert!(matches!(error, ExecutionError::CompileError(msg) if msg.contains("failed to run")));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    mod external {
        use super::*;

        /// A stand-in for wat2wasm, run through `sh` so the test never execs a
        /// file it just wrote.
        fn fake_compiler(script: &str) -> (tempfile::TempDir, tempfile::TempDir, ExternalCompiler) {
            let tools = tempfile::tempdir().unwrap();
            let scratch = tempfile::tempdir().unwrap();
            let script_path = tools.path().join("fake-wat2wasm.sh");
            std::fs::write(&script_path, script).unwrap();
            let compiler = ExternalCompiler {
                program: PathBuf::from("sh"),
                args: vec![script_path.display().to_string()],
                scratch_dir: Some(scratch.path().to_path_buf()),
            };
            (tools, scratch, compiler)
        }

        #[test]
        fn test_success_reads_output_and_cleans_up() {
            let tools = tempfile::tempdir().unwrap();
            let fixture = tools.path().join("square.wasm");
            std::fs::write(&fixture, BuiltinCompiler.compile(SQUARE_WAT).unwrap()).unwrap();

            let script = format!("#!/bin/sh\ncp '{}' \"$3\"\n", fixture.display());
            let (_tools, scratch, compiler) = fake_compiler(&script);

            let wasm = compiler.compile(SQUARE_WAT).unwrap();
            assert_eq!(wasm, std::fs::read(&fixture).unwrap());
            assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
        }

        #[test]
        fn test_failure_carries_diagnostics_and_cleans_up() {
            let script = "#!/bin/sh\necho \"$1:1:2: error: unexpected token\" >&2\nexit 1\n";
            let (_tools, scratch, compiler) = fake_compiler(script);

            let error = compiler.compile("(module (oops))").unwrap_err();
            match error {
                ExecutionError::CompileError(msg) => assert!(msg.contains("unexpected token")),
                other => panic!("Expected CompileError, got {other:?}"),
            }
            assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
        }

        #[test]
        fn test_compiler_receives_the_processed_source() {
            let tools = tempfile::tempdir().unwrap();
            let captured = tools.path().join("captured.wat");
            let fixture = tools.path().join("square.wasm");
            std::fs::write(&fixture, BuiltinCompiler.compile(SQUARE_WAT).unwrap()).unwrap();
            let script = format!(
                "#!/bin/sh\ncp \"$1\" '{}'\ncp '{}' \"$3\"\n",
                captured.display(),
                fixture.display()
            );
            let (_tools, _scratch, compiler) = fake_compiler(&script);

            compiler.compile(SQUARE_WAT).unwrap();
            assert_eq!(std::fs::read_to_string(&captured).unwrap(), SQUARE_WAT);
        }

        #[test]
        fn test_concurrent_compiles_use_distinct_paths() {
            let tools = tempfile::tempdir().unwrap();
            let fixture = tools.path().join("square.wasm");
            std::fs::write(&fixture, BuiltinCompiler.compile(SQUARE_WAT).unwrap()).unwrap();
            let script = format!("#!/bin/sh\ncp '{}' \"$3\"\n", fixture.display());
            let (_tools, scratch, compiler) = fake_compiler(&script);
            let compiler = std::sync::Arc::new(compiler);

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let compiler = compiler.clone();
                    std::thread::spawn(move || compiler.compile(SQUARE_WAT))
                })
                .collect();
            for handle in handles {
                assert!(handle.join().unwrap().is_ok());
            }
            assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
        }
    }
}
