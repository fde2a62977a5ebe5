use std::process::Stdio;

use crate::tool::ToolError;

/// Abstraction over external tool execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
/// Arguments are always passed as a vector; nothing goes through a shell.
#[allow(async_fn_in_trait)]
pub trait ToolExecutor: Send + Sync {
    /// Execute the tool and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, ToolError>;

    /// Execute the tool, streaming output to the terminal.
    async fn exec_streaming(&self, args: &[String]) -> Result<(), ToolError>;

    /// Execute the tool with data piped to stdin.
    async fn exec_with_stdin(&self, args: &[String], stdin_data: &[u8])
    -> Result<String, ToolError>;
}

/// Runs a named program from `PATH`.
#[derive(Debug, Clone, Copy)]
pub struct RealExecutor {
    program: &'static str,
}

impl RealExecutor {
    pub fn new(program: &'static str) -> Self {
        Self { program }
    }

    fn command(&self, args: &[String]) -> tokio::process::Command {
        tracing::debug!(program = self.program, ?args, "exec");
        let mut command = tokio::process::Command::new(self.program);
        command.args(args).kill_on_drop(true);
        command
    }

    fn finish(&self, args: &[String], output: std::process::Output) -> Result<String, ToolError> {
        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| ToolError::InvalidUtf8 {
                program: self.program,
                source: e,
            })
        } else {
            Err(ToolError::CommandFailed {
                program: self.program,
                args: args.to_vec(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }

    fn not_found(&self, source: std::io::Error) -> ToolError {
        ToolError::NotFound {
            program: self.program,
            source,
        }
    }
}

impl ToolExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, ToolError> {
        let output = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.not_found(e))?;

        self.finish(args, output)
    }

    async fn exec_streaming(&self, args: &[String]) -> Result<(), ToolError> {
        let status = self
            .command(args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| self.not_found(e))?;

        if status.success() {
            Ok(())
        } else {
            Err(ToolError::CommandFailed {
                program: self.program,
                args: args.to_vec(),
                stderr: format!("exit code: {status}"),
            })
        }
    }

    async fn exec_with_stdin(
        &self,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, ToolError> {
        use tokio::io::AsyncWriteExt;

        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.not_found(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            let stdin_error = |e| ToolError::StdinWrite {
                program: self.program,
                source: e,
            };
            stdin.write_all(stdin_data).await.map_err(stdin_error)?;
            stdin.shutdown().await.map_err(stdin_error)?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.not_found(e))?;

        self.finish(args, output)
    }
}
