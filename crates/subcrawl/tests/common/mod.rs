//! Shared fixtures for the integration tests
#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::Path;
use subcrawl::config::RetryConfig;
use subcrawl::CrawlConfig;
use subcrawl_common::SubmissionId;
use wiremock::{Request, ResponseTemplate};

/// Configuration with tiny delays so retries and congestion pauses are fast
pub fn fast_config(root: &Path) -> CrawlConfig {
    CrawlConfig::default()
        .with_data_dir(root.join("data"))
        .with_concurrency(4)
        .with_congestion_delay_ms(1)
        .with_retry(RetryConfig {
            max_attempts: Some(3),
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter_ms: 0,
        })
}

pub fn api_submission(id: SubmissionId) -> Value {
    json!({
        "title": format!("Piece {id}"),
        "description": "Made with care.",
        "name": format!("Artist {}", id % 7),
        "profile_name": format!("artist{}", id % 7),
        "keywords": ["ink", "study"],
        "posted_at": "2019-06-01T14:00:00+02:00",
        "rating": "General",
        "download": format!("//d.example.net/art/artist{}/{id}.png", id % 7),
        "favorites": "3"
    })
}

pub fn status_body(registered: u64) -> Value {
    json!({
        "online": {"guests": 900, "registered": registered, "other": 0, "total": registered + 900},
        "fa_server_time": "Jun 1st, 2019 12:00 PM"
    })
}

/// Id embedded in `/submission/{id}.json` or `/view/{id}/`
pub fn id_from_path(request: &Request) -> SubmissionId {
    request
        .url
        .path()
        .trim_start_matches("/submission/")
        .trim_start_matches("/view/")
        .trim_end_matches('/')
        .trim_end_matches(".json")
        .parse()
        .unwrap_or_default()
}

/// API responder: every tenth id is gone, the rest are served
pub fn api_responder(request: &Request) -> ResponseTemplate {
    let id = id_from_path(request);
    if id % 10 == 0 {
        ResponseTemplate::new(404)
    } else {
        ResponseTemplate::new(200).set_body_json(api_submission(id))
    }
}

pub fn live_page(id: SubmissionId, registered: u64) -> String {
    format!(
        r#"<html><body>
<div id="submission_page">
  <div class="submission-id-sub-container">
    <div class="submission-title"><h2><p>Live Piece {id}</p></h2></div>
    by <a href="/user/liveartist/"><strong>LiveArtist</strong></a>
    <span class="popup_date" data-time="1559390400">a while ago</span>
  </div>
  <div class="rating"><img alt="Adult rating" src="/r.png"></div>
  <div class="submission-description">Live description for {id}</div>
  <section class="tags-row"><span class="tags"><a href="/search/x">live</a></span></section>
  <div class="download"><a href="//d.example.net/art/liveartist/{id}.png">Download</a></div>
</div>
<div class="online-stats">{total} users online - 100 guests, {registered} registered</div>
</body></html>"#,
        total = registered + 100
    )
}

pub fn archived_page(id: SubmissionId) -> String {
    format!(
        r#"<html><body>
<div id="page-submission">
  <div class="classic-submission-title information">
    <h2>Archived Piece {id}</h2>
    By <a href="/user/classicartist/">ClassicArtist</a>
  </div>
  <table class="maintable">
    <tr><td class="alt1">stats</td></tr>
    <tr><td class="alt1">Archived description for {id}</td></tr>
  </table>
  <div class="stats-container">
    <span class="popup_date" title="Jun 1st, 2019 12:00 PM">a while ago</span>
    <img alt="General rating" src="/r.png">
    <div id="keywords"><a href="/search/old">old</a></div>
  </div>
  <a href="//d.example.net/art/classicartist/{id}.png">Download</a>
</div>
</body></html>"#
    )
}
