use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use video_harvester::{
    BatchReport, ConfigBuilder, CorruptStatePolicy, CsvSink, HarvestError, HarvestState,
    Harvester, KeywordOutcome, KeywordScheduler, Result, SearchPage, SearchRequest, VideoApi,
    VideoItem,
};

type PageKey = (String, Option<String>);

/// Search results scripted per (keyword, incoming token); unscripted calls fail like a spent quota
#[derive(Default)]
struct ScriptedApi {
    pages: HashMap<PageKey, SearchPage>,
    failing: Mutex<HashSet<PageKey>>,
    search_calls: Mutex<Vec<PageKey>>,
    detail_calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    fn page(
        mut self,
        keyword: &str,
        token: Option<&str>,
        ids: &[&str],
        next: Option<&str>,
    ) -> Self {
        self.pages.insert(
            (keyword.to_string(), token.map(str::to_string)),
            SearchPage {
                video_ids: ids.iter().map(|s| s.to_string()).collect(),
                next_page_token: next.map(str::to_string),
            },
        );
        self
    }

    fn fail_on(self, keyword: &str, token: Option<&str>) -> Self {
        self.failing
            .lock()
            .unwrap()
            .insert((keyword.to_string(), token.map(str::to_string)));
        self
    }

    /// Quota resets overnight
    fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn searches(&self) -> Vec<PageKey> {
        self.search_calls.lock().unwrap().clone()
    }

    fn detail_ids(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }

    fn reset_calls(&self) {
        self.search_calls.lock().unwrap().clear();
        self.detail_calls.lock().unwrap().clear();
    }
}

fn video(id: &str) -> VideoItem {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "snippet": {
            "title": format!("Video {}", id),
            "description": "",
            "tags": ["music"],
            "channelId": "UC123",
            "channelTitle": "Channel",
            "publishedAt": "2024-03-01T10:00:00Z"
        },
        "contentDetails": {
            "duration": "PT4M",
            "definition": "hd",
            "caption": "false",
            "licensedContent": true
        },
        "statistics": {"viewCount": "100", "likeCount": "10"}
    }))
    .unwrap()
}

#[async_trait]
impl VideoApi for ScriptedApi {
    async fn search(&self, request: &SearchRequest<'_>) -> Result<SearchPage> {
        let key = (
            request.query.to_string(),
            request.page_token.map(str::to_string),
        );
        self.search_calls.lock().unwrap().push(key.clone());

        if self.failing.lock().unwrap().contains(&key) {
            return Err(HarvestError::QuotaExceeded("The request cannot be completed".to_string()));
        }
        self.pages
            .get(&key)
            .cloned()
            .ok_or_else(|| HarvestError::UnexpectedResponse(format!("unscripted page {:?}", key)))
    }

    async fn details(&self, ids: &[String]) -> Result<Vec<VideoItem>> {
        self.detail_calls.lock().unwrap().extend(ids.iter().cloned());
        Ok(ids.iter().map(|id| video(id)).collect())
    }
}

async fn run_batch(
    api: &Arc<ScriptedApi>,
    dir: &Path,
    keywords: &[&str],
    max_pages: u32,
    policy: CorruptStatePolicy,
) -> BatchReport {
    let config = ConfigBuilder::new()
        .with_keywords(keywords.iter().copied())
        .with_max_pages(max_pages)
        .with_state_dir(dir.join("state"))
        .with_output(dir.join("results.csv"))
        .with_corrupt_state_policy(policy)
        .build();

    let state = HarvestState::open(&config.storage, policy).await.unwrap();
    let sink = CsvSink::new(&config.output.csv_path);
    let harvester = Harvester::new(api.clone(), state, sink, &config);
    let mut scheduler = KeywordScheduler::new(harvester, config.harvest.keywords.clone());

    scheduler.run().await.unwrap()
}

async fn open_state(dir: &Path) -> HarvestState {
    let storage = video_harvester::config::StorageConfig {
        state_dir: dir.join("state"),
    };
    HarvestState::open(&storage, CorruptStatePolicy::Fail).await.unwrap()
}

fn csv_rows(dir: &Path) -> Vec<csv::StringRecord> {
    let path = dir.join("results.csv");
    if !path.exists() {
        return Vec::new();
    }
    csv::Reader::from_path(path)
        .unwrap()
        .records()
        .map(|r| r.unwrap())
        .collect()
}

fn key(keyword: &str, token: Option<&str>) -> PageKey {
    (keyword.to_string(), token.map(str::to_string))
}

#[tokio::test]
async fn test_two_keyword_batch_completes_and_clears_state() {
    let temp_dir = TempDir::new().unwrap();
    let api = Arc::new(
        ScriptedApi::default()
            .page("A", None, &["a1", "a2"], Some("A-2"))
            .page("A", Some("A-2"), &["a3"], None)
            .page("B", None, &["b1"], None),
    );

    let report = run_batch(&api, temp_dir.path(), &["A", "B"], 50, CorruptStatePolicy::Fail).await;

    assert!(report.is_complete());
    assert_eq!(report.start_index, 0);
    assert_eq!(report.outcomes.len(), 2);
    assert!(matches!(report.outcomes[0].1, KeywordOutcome::Exhausted(_)));
    assert_eq!(report.outcomes[0].1.stats().pages, 2);
    assert_eq!(report.total_records(), 4);

    assert_eq!(
        api.searches(),
        vec![key("A", None), key("A", Some("A-2")), key("B", None)]
    );

    let state = open_state(temp_dir.path()).await;
    assert_eq!(state.marker.get().await.unwrap(), None);
    assert!(state.cursors.pending().await.unwrap().is_empty());
    assert_eq!(state.ids.load().await.unwrap().len(), 4);

    let rows = csv_rows(temp_dir.path());
    assert_eq!(rows.len(), 4);
    assert_eq!(&rows[0][0], "Video a1");
    assert_eq!(&rows[3][14], "B");
    assert_eq!(&rows[0][12], "N/A");
}

#[tokio::test]
async fn test_rerun_after_completion_fetches_no_details() {
    let temp_dir = TempDir::new().unwrap();
    let api = Arc::new(
        ScriptedApi::default()
            .page("A", None, &["a1", "a2"], None)
            .page("B", None, &["a2", "b1"], None),
    );

    run_batch(&api, temp_dir.path(), &["A", "B"], 50, CorruptStatePolicy::Fail).await;
    assert_eq!(api.detail_ids(), vec!["a1", "a2", "b1"]);

    api.reset_calls();
    let report = run_batch(&api, temp_dir.path(), &["A", "B"], 50, CorruptStatePolicy::Fail).await;

    assert!(report.is_complete());
    assert_eq!(report.total_records(), 0);
    assert_eq!(api.searches().len(), 2);
    assert!(api.detail_ids().is_empty());
    assert_eq!(csv_rows(temp_dir.path()).len(), 3);
}

#[tokio::test]
async fn test_quota_failure_resumes_at_interrupted_keyword() {
    let temp_dir = TempDir::new().unwrap();
    let api = Arc::new(
        ScriptedApi::default()
            .page("A", None, &["a1"], None)
            .page("B", None, &["b1", "b2"], Some("B-2"))
            .page("B", Some("B-2"), &["b3"], None)
            .page("C", None, &["c1"], None)
            .fail_on("B", Some("B-2")),
    );

    let report =
        run_batch(&api, temp_dir.path(), &["A", "B", "C"], 50, CorruptStatePolicy::Fail).await;

    assert!(!report.is_complete());
    assert_eq!(report.interrupted_at.as_deref(), Some("B"));
    let (keyword, error) = report.interruption().unwrap();
    assert_eq!(keyword, "B");
    assert!(matches!(error, HarvestError::QuotaExceeded(_)));
    assert!(!api.searches().iter().any(|(k, _)| k == "C"));

    let state = open_state(temp_dir.path()).await;
    assert_eq!(state.marker.get().await.unwrap().as_deref(), Some("B"));
    assert_eq!(state.cursors.get("B").await.unwrap().as_deref(), Some("B-2"));
    assert_eq!(csv_rows(temp_dir.path()).len(), 3);

    // Next day: quota is back
    api.heal();
    api.reset_calls();
    let report =
        run_batch(&api, temp_dir.path(), &["A", "B", "C"], 50, CorruptStatePolicy::Fail).await;

    assert!(report.is_complete());
    assert_eq!(report.start_index, 1);
    assert_eq!(
        api.searches(),
        vec![key("B", Some("B-2")), key("C", None)]
    );
    assert_eq!(api.detail_ids(), vec!["b3", "c1"]);
    assert_eq!(state.marker.get().await.unwrap(), None);
    assert!(state.cursors.pending().await.unwrap().is_empty());
    assert_eq!(csv_rows(temp_dir.path()).len(), 5);
}

#[tokio::test]
async fn test_failure_on_first_page_keeps_no_cursor() {
    let temp_dir = TempDir::new().unwrap();
    let api = Arc::new(ScriptedApi::default().page("A", None, &["a1"], None).fail_on("A", None));

    let report = run_batch(&api, temp_dir.path(), &["A"], 50, CorruptStatePolicy::Fail).await;

    assert_eq!(report.interrupted_at.as_deref(), Some("A"));
    let state = open_state(temp_dir.path()).await;
    assert_eq!(state.marker.get().await.unwrap().as_deref(), Some("A"));
    assert!(state.cursors.pending().await.unwrap().is_empty());
    assert!(state.ids.load().await.unwrap().is_empty());
    assert!(csv_rows(temp_dir.path()).is_empty());
}

#[tokio::test]
async fn test_page_cap_leaves_cursor_and_batch_continues() {
    let temp_dir = TempDir::new().unwrap();
    let mut api = ScriptedApi::default().page("B", None, &["b1"], None);
    for i in 0..10 {
        let token = format!("A-{}", i);
        let next = format!("A-{}", i + 1);
        let id = format!("a{}", i);
        let incoming = if i == 0 { None } else { Some(token.as_str()) };
        api = api.page("A", incoming, &[id.as_str()], Some(next.as_str()));
    }
    let api = Arc::new(api);

    let report = run_batch(&api, temp_dir.path(), &["A", "B"], 3, CorruptStatePolicy::Fail).await;

    assert!(report.is_complete());
    assert!(matches!(report.outcomes[0].1, KeywordOutcome::PageCapReached(_)));
    assert_eq!(report.outcomes[0].1.stats().pages, 3);
    assert_eq!(api.searches().iter().filter(|(k, _)| k == "A").count(), 3);

    let state = open_state(temp_dir.path()).await;
    assert_eq!(state.marker.get().await.unwrap(), None);
    assert_eq!(state.cursors.get("A").await.unwrap().as_deref(), Some("A-3"));
    assert_eq!(state.cursors.pending().await.unwrap(), vec!["A".to_string()]);

    // The next run picks A up from its cursor
    api.reset_calls();
    run_batch(&api, temp_dir.path(), &["A", "B"], 3, CorruptStatePolicy::Fail).await;
    assert_eq!(api.searches()[0], key("A", Some("A-3")));
}

#[tokio::test]
async fn test_unknown_marker_starts_from_first_keyword() {
    let temp_dir = TempDir::new().unwrap();
    let state = open_state(temp_dir.path()).await;
    state.marker.set("dropped keyword").await.unwrap();

    let api = Arc::new(
        ScriptedApi::default()
            .page("A", None, &["a1"], None)
            .page("B", None, &["b1"], None),
    );
    let report = run_batch(&api, temp_dir.path(), &["A", "B"], 50, CorruptStatePolicy::Fail).await;

    assert_eq!(report.start_index, 0);
    assert_eq!(api.searches()[0], key("A", None));
    assert_eq!(state.marker.get().await.unwrap(), None);
}

#[tokio::test]
async fn test_corrupt_id_set_policy() {
    let temp_dir = TempDir::new().unwrap();
    let state_dir = temp_dir.path().join("state");
    std::fs::create_dir_all(&state_dir).unwrap();
    std::fs::write(state_dir.join("video_ids.json"), "[\"half-writ").unwrap();

    let api = Arc::new(ScriptedApi::default().page("A", None, &["a1"], None));

    let report = run_batch(&api, temp_dir.path(), &["A"], 50, CorruptStatePolicy::Fail).await;
    let (_, error) = report.interruption().unwrap();
    assert!(matches!(error, HarvestError::CorruptState { .. }));
    assert!(api.searches().is_empty());
    assert_eq!(
        std::fs::read_to_string(state_dir.join("video_ids.json")).unwrap(),
        "[\"half-writ"
    );

    let report = run_batch(&api, temp_dir.path(), &["A"], 50, CorruptStatePolicy::Reset).await;
    assert!(report.is_complete());
    assert_eq!(report.total_records(), 1);
    let state = open_state(temp_dir.path()).await;
    assert!(state.ids.contains("a1").await.unwrap());
}

#[tokio::test]
async fn test_non_ascii_keywords_persist_cursors() {
    let temp_dir = TempDir::new().unwrap();
    let api = Arc::new(
        ScriptedApi::default()
            .page("اغاني", None, &["x1"], Some("tok/1"))
            .fail_on("اغاني", Some("tok/1")),
    );

    run_batch(&api, temp_dir.path(), &["اغاني"], 50, CorruptStatePolicy::Fail).await;

    let state = open_state(temp_dir.path()).await;
    assert_eq!(state.cursors.pending().await.unwrap(), vec!["اغاني".to_string()]);
    assert_eq!(state.cursors.get("اغاني").await.unwrap().as_deref(), Some("tok/1"));
    assert_eq!(state.marker.get().await.unwrap().as_deref(), Some("اغاني"));
}

#[tokio::test]
async fn test_long_keyword_does_not_stall_batch() {
    let temp_dir = TempDir::new().unwrap();
    let long_keyword = "اغاني مهرجانات شعبية مصرية جديدة للافراح والحفلات";
    let api = Arc::new(
        ScriptedApi::default()
            .page(long_keyword, None, &["l1"], Some("L-2"))
            .page("B", None, &["b1"], None),
    );

    let keywords = [long_keyword, "B"];
    let report = run_batch(&api, temp_dir.path(), &keywords, 1, CorruptStatePolicy::Fail).await;

    assert!(report.is_complete());
    assert_eq!(report.total_records(), 2);

    let state = open_state(temp_dir.path()).await;
    assert_eq!(state.marker.get().await.unwrap(), None);
    assert_eq!(state.cursors.get(long_keyword).await.unwrap().as_deref(), Some("L-2"));
    assert_eq!(state.cursors.pending().await.unwrap(), vec![long_keyword.to_string()]);
}
