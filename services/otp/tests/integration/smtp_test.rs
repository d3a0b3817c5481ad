use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use codegate_otp::infra::smtp::{SmtpContext, SmtpLimits, run_session};

use crate::helpers::{Harness, TEST_DOMAIN, harness};

/// Play `script` against one session and return everything the server said.
async fn converse(h: &Harness, script: &str) -> String {
    let ctx = Arc::new(SmtpContext {
        domain: TEST_DOMAIN.to_owned(),
        limits: SmtpLimits::default(),
        intake: h.state.mail_intake(),
    });
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let session = tokio::spawn(run_session(server, ctx));

    client.write_all(script.as_bytes()).await.unwrap();
    let mut transcript = String::new();
    client.read_to_string(&mut transcript).await.unwrap();
    session.await.unwrap().unwrap();
    transcript
}

fn reply_codes(transcript: &str) -> Vec<&str> {
    transcript
        .lines()
        .filter(|l| l.as_bytes().get(3) == Some(&b' '))
        .map(|l| &l[..3])
        .collect()
}

#[tokio::test]
async fn mail_from_known_sender_should_issue_and_reply() {
    let h = harness(false);
    let script = format!(
        "EHLO client.example.org\r\n\
         MAIL FROM:<bounce@example.org>\r\n\
         RCPT TO:<code@{TEST_DOMAIN}>\r\n\
         DATA\r\n\
         From: Alice <alice@example.org>\r\n\
         To: code@{TEST_DOMAIN}\r\n\
         Subject: code please\r\n\
         \r\n\
         hi\r\n\
         .\r\n\
         QUIT\r\n"
    );

    let transcript = converse(&h, &script).await;
    assert_eq!(
        reply_codes(&transcript),
        ["220", "250", "250", "250", "354", "250", "221"]
    );

    let sent = h.notifier.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.org");
    assert_eq!(h.store.active_codes()[0].requester, "alice@example.org");
}

#[tokio::test]
async fn foreign_recipient_should_be_refused_without_issuing() {
    let h = harness(false);
    let script = "HELO client.example.org\r\n\
                  MAIL FROM:<someone@example.org>\r\n\
                  RCPT TO:<wrong@otherdomain.com>\r\n\
                  DATA\r\n\
                  QUIT\r\n";

    let transcript = converse(&h, script).await;
    assert_eq!(
        reply_codes(&transcript),
        ["220", "250", "250", "550", "503", "221"]
    );
    assert!(h.store.is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn message_without_from_should_be_accepted_but_ignored() {
    let h = harness(false);
    let script = format!(
        "HELO client.example.org\r\n\
         MAIL FROM:<>\r\n\
         RCPT TO:<code@{TEST_DOMAIN}>\r\n\
         DATA\r\n\
         Subject: no sender\r\n\
         \r\n\
         body\r\n\
         .\r\n\
         QUIT\r\n"
    );

    let transcript = converse(&h, &script).await;
    assert_eq!(
        reply_codes(&transcript),
        ["220", "250", "250", "250", "354", "250", "221"]
    );
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn recipient_domain_match_should_ignore_case() {
    let h = harness(false);
    let script = format!(
        "HELO client.example.org\r\n\
         MAIL FROM:<carol@example.org>\r\n\
         RCPT TO:<Code@{}>\r\n\
         QUIT\r\n",
        TEST_DOMAIN.to_uppercase()
    );

    let transcript = converse(&h, &script).await;
    assert_eq!(reply_codes(&transcript), ["220", "250", "250", "250", "221"]);
}
