//! 针对真实 ILIAS 实例的集成测试
//!
//! 默认忽略，需要手动运行：
//! `ILIAS_URL=... ILIAS_USER=... ILIAS_PASSWORD=... cargo test -- --ignored`

use std::path::PathBuf;

use ilias_exam_robot::config::Config;
use ilias_exam_robot::infrastructure::{HttpSession, SimpleAuthenticator};
use ilias_exam_robot::services::resolve_targets;
use ilias_exam_robot::workflow::slurp_tests_from_folder;

fn live_session() -> (HttpSession, String) {
    let url = std::env::var("ILIAS_URL").expect("需要设置 ILIAS_URL");
    let user = std::env::var("ILIAS_USER").expect("需要设置 ILIAS_USER");
    let password = std::env::var("ILIAS_PASSWORD").ok();

    let config = Config::from_env();
    let session = HttpSession::new(
        &config,
        &url,
        Box::new(SimpleAuthenticator::new(user, password)),
        &PathBuf::from(".cookies-test"),
    )
    .expect("建立会话失败");
    (session, url)
}

#[tokio::test]
#[ignore] // 默认忽略，需要真实的 ILIAS 实例
async fn test_login_and_fetch_folder() {
    let (session, url) = live_session();

    let page = session.get_page(&url).await.expect("抓取文件夹失败");
    let children = page.child_elements().expect("解析子元素失败");
    println!("找到 {} 个子元素", children.len());
}

#[tokio::test]
#[ignore]
async fn test_resolve_replicate_pattern() {
    let (session, url) = live_session();

    let pattern = std::env::var("ILIAS_REPLICATE").unwrap_or_else(|_| "*".to_string());
    let targets = resolve_targets(&session, &url, &pattern)
        .await
        .expect("解析模式失败");
    for target in &targets {
        println!("{} -> {}", target.path.display(), target.url);
    }
    assert!(!targets.is_empty(), "模式应该至少匹配一个目标");
}

#[tokio::test]
#[ignore]
async fn test_slurp_folder_to_spec() {
    let (session, url) = live_session();

    let data_dir = PathBuf::from("slurp-test-data");
    let tests = slurp_tests_from_folder(&session, &url, &data_dir)
        .await
        .expect("抓取测验失败");
    println!("抓取到 {} 个测验", tests.len());
    for test in &tests {
        println!("  {:?} ({} 道题)", test.title, test.questions.len());
    }
}
