// tests/capture_exact.rs
//
// The only test in its binary: with nothing else running, the harness writes
// nothing to fd 1 while a capture window is open, so the captured text can be
// compared byte for byte.

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::AsFd;
use std::os::unix::fs::MetadataExt;

use clap_lambda::capture::ExecutionWrapper;
use clap_lambda_test_utils::fake_program::ScriptedProgram;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Channel {
    Stdout,
    Stderr,
    Program,
}

fn channel() -> impl Strategy<Value = Channel> {
    prop_oneof![
        Just(Channel::Stdout),
        Just(Channel::Stderr),
        Just(Channel::Program),
    ]
}

fn tag(channel: Channel) -> char {
    match channel {
        Channel::Stdout => 'o',
        Channel::Stderr => 'e',
        Channel::Program => 'p',
    }
}

fn std_stream_ids() -> [(u64, u64); 2] {
    let id = |fd: std::os::fd::BorrowedFd<'_>| {
        let meta = File::from(fd.try_clone_to_owned().unwrap())
            .metadata()
            .unwrap();
        (meta.dev(), meta.ino())
    };
    [id(io::stdout().as_fd()), id(io::stderr().as_fd())]
}

/// Lines of one channel, in the order they appear in `text`.
fn tokens_of(text: &str, channel: Channel) -> Vec<String> {
    let prefix = tag(channel);
    text.split_inclusive('\n')
        .filter(|line| line.starts_with(prefix))
        .map(str::to_string)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn capture_holds_exactly_what_was_written(
        writes in proptest::collection::vec((channel(), "[a-z0-9 ]{0,24}"), 0..40),
        argv in proptest::collection::vec("[a-z-]{1,8}", 0..4),
    ) {
        let before = std_stream_ids();

        let script = writes.clone();
        let wrapper = ExecutionWrapper::new(ScriptedProgram::new(move |_, out, _| {
            for (i, (channel, body)) in script.iter().enumerate() {
                let token = format!("{}{i}:{body}\n", tag(*channel));
                match channel {
                    Channel::Stdout => io::stdout().write_all(token.as_bytes())?,
                    Channel::Stderr => io::stderr().write_all(token.as_bytes())?,
                    Channel::Program => out.write_all(token.as_bytes())?,
                }
            }
            io::stdout().flush()?;
            Ok(())
        }));

        let execution = wrapper.execute(argv).unwrap();
        prop_assert!(execution.is_success());
        let text = execution.output.text;

        if writes.is_empty() {
            prop_assert_eq!(text.as_str(), "");
        }

        // Same bytes overall: nothing lost, nothing duplicated.
        let expected_len: usize = writes
            .iter()
            .enumerate()
            .map(|(i, (c, body))| format!("{}{i}:{body}\n", tag(*c)).len())
            .sum();
        prop_assert_eq!(text.len(), expected_len);

        // Each channel's writes arrive whole and in their original order.
        for channel in [Channel::Stdout, Channel::Stderr, Channel::Program] {
            let expected: Vec<String> = writes
                .iter()
                .enumerate()
                .filter(|(_, (c, _))| tag(*c) == tag(channel))
                .map(|(i, (c, body))| format!("{}{i}:{body}\n", tag(*c)))
                .collect();
            prop_assert_eq!(tokens_of(&text, channel), expected);
        }

        prop_assert_eq!(std_stream_ids(), before);
    }
}
