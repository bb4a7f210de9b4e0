//! Process lifecycle: the status command must exit cleanly when the bar
//! terminates it.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

fn spawn_barstat() -> Child {
    Command::new(env!("CARGO_BIN_EXE_barstat"))
        .args([
            "--interval",
            "1",
            "--socket-env",
            "BARSTAT_TEST_UNSET_SOCKET",
            "--audio-init-timeout-ms",
            "200",
            "--server-info-timeout-ms",
            "100",
            "--volume-timeout-ms",
            "100",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap()
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let started = Instant::now();
    while started.elapsed() < timeout {
        if let Some(status) = child.try_wait().unwrap() {
            return Some(status);
        }
        thread::sleep(Duration::from_millis(20));
    }
    None
}

fn send_signal(child: &Child, signal: libc::c_int) {
    // SAFETY: plain kill(2) on a child we spawned and have not reaped yet.
    let ret = unsafe { libc::kill(child.id() as libc::pid_t, signal) };
    assert_eq!(ret, 0);
}

/// Keep reading stdout so the child never writes into a closed pipe
fn forward_lines(child: &mut Child) -> mpsc::Receiver<String> {
    let stdout = child.stdout.take().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

fn assert_clean_exit_on(signal: libc::c_int) {
    let mut child = spawn_barstat();
    let lines = forward_lines(&mut child);

    // A printed line means the signal handler is already installed
    let first = lines.recv_timeout(Duration::from_secs(15));
    let Ok(first) = first else {
        let _ = child.kill();
        panic!("no status line printed");
    };
    assert!(first.starts_with("| RAM: "), "unexpected line: {}", first);

    send_signal(&child, signal);

    match wait_with_timeout(&mut child, Duration::from_secs(10)) {
        Some(status) => assert!(status.success(), "exit status: {:?}", status),
        None => {
            let _ = child.kill();
            panic!("barstat did not stop");
        }
    }
}

#[test]
fn test_sigterm_stops_cleanly() {
    assert_clean_exit_on(libc::SIGTERM);
}

#[test]
fn test_sigint_stops_cleanly() {
    assert_clean_exit_on(libc::SIGINT);
}
