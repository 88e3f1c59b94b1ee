//! Reachability checks via the OS `ping` utility.
//!
//! Ping is used as a liveness proxy for "the TV is powered on": the control
//! service only answers while the panel is up, but the network interface
//! answers ICMP as soon as the TV has power.

use std::process::Stdio;

/// Build the platform-specific ping command for a single echo request.
fn ping_command(host: &str, timeout_s: u64) -> std::process::Command {
    let mut cmd = std::process::Command::new("ping");
    if cfg!(windows) {
        cmd.args(["-n", "1", "-w", &(timeout_s * 1000).to_string()]);
    } else {
        cmd.args(["-c", "1", "-W", &timeout_s.to_string()]);
    }
    cmd.arg(host);
    cmd.stdout(Stdio::null()).stderr(Stdio::null());
    cmd
}

/// Ping `host` once. Returns whether it answered within the timeout.
pub async fn host_is_reachable(host: &str, timeout_s: u64) -> std::io::Result<bool> {
    let status = tokio::process::Command::from(ping_command(host, timeout_s))
        .status()
        .await?;
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_command_args() {
        let cmd = ping_command("10.0.0.28", 1);
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(cmd.get_program(), "ping");
        if cfg!(windows) {
            assert_eq!(args, ["-n", "1", "-w", "1000", "10.0.0.28"]);
        } else {
            assert_eq!(args, ["-c", "1", "-W", "1", "10.0.0.28"]);
        }
    }
}
