use mockito::Matcher;
use payoll_core::adapters::HttpMailer;
use payoll_core::config::MailConfig;
use payoll_core::ports::{MailMessage, Mailer};
use serde_json::json;
use std::time::Duration;

fn mailer(server: &mockito::Server) -> HttpMailer {
    HttpMailer::from_config(
        &MailConfig {
            api_url: format!("{}/send", server.url()),
            api_key: "mail-key".to_string(),
            from: "PayOll <no-reply@payoll.test>".to_string(),
        },
        Duration::from_secs(5),
    )
}

fn otp_mail() -> MailMessage {
    MailMessage {
        to: vec!["buyer@example.com".to_string(), "ops@example.com".to_string()],
        subject: "PayOll verification code".to_string(),
        body: "Your verify-email code is 123456.".to_string(),
    }
}

#[tokio::test]
async fn test_send_posts_form_with_api_key() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/send")
        .match_header("x-api-key", "mail-key")
        .match_header(
            "content-type",
            Matcher::Regex("^application/x-www-form-urlencoded".into()),
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("from".into(), "PayOll <no-reply@payoll.test>".into()),
            Matcher::UrlEncoded("to".into(), "buyer@example.com,ops@example.com".into()),
            Matcher::UrlEncoded("subject".into(), "PayOll verification code".into()),
            Matcher::UrlEncoded("plain".into(), "Your verify-email code is 123456.".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "success": true, "message": "The email has been sent." }).to_string())
        .create_async()
        .await;

    mailer(&server).send(&otp_mail()).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_fails_when_api_reports_failure() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/send")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "success": false, "message": "Domain not verified" }).to_string())
        .create_async()
        .await;

    let err = mailer(&server).send(&otp_mail()).await.unwrap_err();
    assert!(err.to_string().contains("Domain not verified"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_fails_on_rejected_key() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/send")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(json!({ "success": false, "message": "Invalid API key" }).to_string())
        .create_async()
        .await;

    let err = mailer(&server).send(&otp_mail()).await.unwrap_err();
    assert!(err.to_string().contains("HTTP 401"));
}
