// tests/process_lifecycle.rs

use std::error::Error;
use std::time::Duration;

use procbroker::types::ProcessState;
use procbroker_test_utils::{TestBroker, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

async fn wait_until_terminal(broker: &TestBroker, pid: u32) -> procbroker::protocol::Process {
    with_timeout(async {
        loop {
            let process = broker.client.get_process(pid).await.unwrap();
            if process.state.is_terminal() {
                return process;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

#[tokio::test]
async fn echo_hello_succeeds_with_exact_output() -> TestResult {
    init_tracing();
    let broker = TestBroker::start().await?;

    let created = broker.client.create_process("echo", &["hello".into()]).await?;
    assert_eq!(created.state, ProcessState::Running);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    with_timeout(broker.client.stdout(created.pid, &mut stdout)).await?;
    with_timeout(broker.client.stderr(created.pid, &mut stderr)).await?;
    assert_eq!(stdout, b"hello\n");
    assert!(stderr.is_empty());

    let done = broker.client.get_process(created.pid).await?;
    assert_eq!(done.state, ProcessState::Succeeded);
    assert_eq!(done.exit_code, 0);
    assert_eq!(done.exit_err, "");

    broker.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn sleep_is_running_then_succeeds() -> TestResult {
    init_tracing();
    let broker = TestBroker::start().await?;

    let created = broker.client.create_process("sleep", &["1".into()]).await?;
    let now = broker.client.get_process(created.pid).await?;
    assert_eq!(now.state, ProcessState::Running);

    let done = wait_until_terminal(&broker, created.pid).await;
    assert_eq!(done.state, ProcessState::Succeeded);

    broker.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn externally_killed_process_fails_with_minus_one() -> TestResult {
    init_tracing();
    let broker = TestBroker::start().await?;

    let created = broker.client.create_process("sleep", &["30".into()]).await?;
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(created.pid as i32),
        nix::sys::signal::Signal::SIGKILL,
    )?;

    let done = wait_until_terminal(&broker, created.pid).await;
    assert_eq!(done.state, ProcessState::Failed);
    assert_eq!(done.exit_code, -1);
    assert_eq!(done.exit_err, "signal: killed");

    // Terminal states never go back to running.
    for _ in 0..5 {
        let again = broker.client.get_process(created.pid).await?;
        assert_eq!(again, done);
    }

    broker.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_fails_with_its_code() -> TestResult {
    init_tracing();
    let broker = TestBroker::start().await?;

    let created = broker
        .client
        .create_process("sh", &["-c".into(), "exit 3".into()])
        .await?;
    let done = wait_until_terminal(&broker, created.pid).await;
    assert_eq!(done.state, ProcessState::Failed);
    assert_eq!(done.exit_code, 3);
    assert_eq!(done.exit_err, "exit status 3");

    broker.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn list_is_empty_then_has_exactly_the_created_pids() -> TestResult {
    init_tracing();
    let broker = TestBroker::start().await?;

    assert!(broker.client.list_processes().await?.is_empty());

    let a = broker.client.create_process("true", &[]).await?;
    let b = broker.client.create_process("sleep", &["1".into()]).await?;

    let mut pids: Vec<u32> = broker
        .client
        .list_processes()
        .await?
        .into_iter()
        .map(|p| p.pid)
        .collect();
    pids.sort_unstable();
    let mut expected = vec![a.pid, b.pid];
    expected.sort_unstable();
    assert_eq!(pids, expected);

    wait_until_terminal(&broker, b.pid).await;
    broker.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn unknown_pid_is_not_found() -> TestResult {
    init_tracing();
    let broker = TestBroker::start().await?;

    let err = broker.client.get_process(999_999).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    let mut sink = Vec::new();
    let err = broker.client.stdout(999_999, &mut sink).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    broker.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn failed_spawn_registers_nothing() -> TestResult {
    init_tracing();
    let broker = TestBroker::start().await?;

    let err = broker
        .client
        .create_process("/no/such/executable", &[])
        .await
        .unwrap_err();
    assert_eq!(err.code(), procbroker::errors::ErrorCode::SpawnFailed);
    assert!(broker.client.list_processes().await?.is_empty());

    let leftovers: Vec<_> = std::fs::read_dir(broker.dir())?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("procbroker."))
        .collect();
    assert!(leftovers.is_empty());

    broker.shutdown().await?;
    Ok(())
}
