use std::process::Stdio;
use std::time::Duration;

use docker_cron_core::{CommandOutput, SchedulerError, SchedulerResult};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 本地进程执行
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    default_timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            default_timeout: Some(timeout),
        }
    }

    fn command(argv: &[String]) -> SchedulerResult<Command> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SchedulerError::execution_error("命令为空"))?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }

    /// 执行到结束并收集输出；超时后进程被终止
    pub async fn run(&self, argv: &[String]) -> SchedulerResult<CommandOutput> {
        self.run_with_timeout(argv, self.default_timeout).await
    }

    pub async fn run_with_timeout(
        &self,
        argv: &[String],
        timeout: Option<Duration>,
    ) -> SchedulerResult<CommandOutput> {
        debug!("执行命令: {:?}", argv);
        let mut child = Self::command(argv)?
            .spawn()
            .map_err(|e| SchedulerError::execution_error(format!("启动命令失败 {:?}: {e}", argv)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SchedulerError::execution_error("无法获取stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SchedulerError::execution_error("无法获取stderr"))?;

        let collect = async {
            let mut out = String::new();
            let mut err = String::new();
            let (read_out, read_err) =
                tokio::join!(stdout.read_to_string(&mut out), stderr.read_to_string(&mut err));
            read_out?;
            read_err?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>(CommandOutput {
                exit_code: status.code(),
                stdout: out,
                stderr: err,
            })
        };

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, collect).await.map_err(|_| {
                SchedulerError::execution_error(format!("命令超时 ({}s): {:?}", limit.as_secs(), argv))
            })??,
            None => collect.await?,
        };
        Ok(output)
    }

    /// 启动长时间运行的进程，按行推送标准输出；进程退出或接收端关闭时结束
    pub fn stream_lines(&self, argv: &[String]) -> SchedulerResult<mpsc::Receiver<String>> {
        let mut child = Self::command(argv)?
            .spawn()
            .map_err(|e| SchedulerError::execution_error(format!("启动命令失败 {:?}: {e}", argv)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SchedulerError::execution_error("无法获取stdout"))?;

        let (tx, rx) = mpsc::channel(256);
        let program = argv.join(" ");
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("读取 {} 输出失败: {}", program, e);
                        break;
                    }
                }
            }
            let _ = child.kill().await;
            debug!("{} 已结束", program);
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_collects_output() {
        let output = ProcessRunner::new()
            .run(&argv(&["sh", "-c", "echo hello; echo oops >&2"]))
            .await
            .unwrap();

        assert!(output.is_success());
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let output = ProcessRunner::new()
            .run(&argv(&["sh", "-c", "exit 3"]))
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.is_success());
    }

    #[tokio::test]
    async fn test_empty_and_missing_programs_fail() {
        let runner = ProcessRunner::new();
        assert!(runner.run(&[]).await.is_err());
        assert!(runner
            .run(&argv(&["/definitely/not/a/program"]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_timeout() {
        let result = ProcessRunner::with_timeout(Duration::from_millis(100))
            .run(&argv(&["sleep", "5"]))
            .await;
        assert!(matches!(result, Err(SchedulerError::TaskExecution(_))));
    }

    #[tokio::test]
    async fn test_stream_lines() {
        let mut rx = ProcessRunner::new()
            .stream_lines(&argv(&["sh", "-c", "echo a; echo b"]))
            .unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
        assert_eq!(rx.recv().await, None);
    }
}
