//! 创建流程的端到端测试
//!
//! 用一个进程内的假 ILIAS（axum）承接全部请求，数出创建一个测验
//! 到底发了多少次提交：2 个目标文件夹 × 1 个测验（3 道题）应当产生
//! 2 次创建、4 次设置提交（双重提交 × 2）、6 次题目创建与定稿、
//! 2 次重排。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use axum::Router;

use ilias_exam_robot::config::Config;
use ilias_exam_robot::infrastructure::login::{Credentials, StaticAuthenticator};
use ilias_exam_robot::infrastructure::HttpSession;
use ilias_exam_robot::models::spec::{ChoiceAnswer, IliasTest, TestQuestion};
use ilias_exam_robot::services::resolve_targets;
use ilias_exam_robot::workflow::{add_test, TestCtx};

type Counters = Arc<Mutex<HashMap<&'static str, usize>>>;

fn bump(counters: &Counters, key: &'static str) {
    *counters.lock().unwrap().entry(key).or_insert(0) += 1;
}

/// 所有页面都带登出链接（已登录）；需要时附加成功提示
fn page(body: &str, with_success: bool) -> Html<String> {
    let alert = if with_success {
        r#"<div role="status" class="alert alert-success">Gespeichert</div>"#
    } else {
        ""
    };
    Html(format!(
        r#"<html><body>
        <a href="logout.php">Abmelden</a>
        {alert}
        {body}
        </body></html>"#
    ))
}

fn tab_bar() -> &'static str {
    r#"<div id="ilTab"><ul>
        <li id="tab_settings"><a href="/test/settings?cmdClass=ilObjTestSettingsGeneralGUI">Einstellungen</a></li>
        <li id="tab_questions"><a href="/test/questions?cmdClass=ilObjTestGUI&amp;cmd=questions">Fragen</a></li>
    </ul></div>"#
}

fn question_table() -> &'static str {
    r#"<table id="tst_qst_lst_1"><tbody>
        <tr><td name="order[901]">10</td><td><a href="/test/question/preview?q_id=901">Auswahlfrage</a></td></tr>
        <tr><td name="order[902]">20</td><td><a href="/test/question/preview?q_id=902">Essayfrage</a></td></tr>
        <tr><td name="order[903]">30</td><td><a href="/test/question/preview?q_id=903">Abgabefrage</a></td></tr>
    </tbody></table>"#
}

fn stub_router(counters: Counters) -> Router {
    Router::new()
        .route(
            "/folder/root",
            get(|| async {
                page(
                    r#"<a class="il_ContainerItemTitle" href="/folder/a">Gruppe A</a>
                       <a class="il_ContainerItemTitle" href="/folder/b">Gruppe B</a>"#,
                    false,
                )
            }),
        )
        .route(
            "/folder/:id",
            get(|| async {
                page(
                    r#"<a id="tst" href="/create?cmd=create&amp;new_type=tst">Neues Objekt: Test</a>"#,
                    false,
                )
            }),
        )
        .route(
            "/create",
            get(|| async {
                page(
                    r#"<form action="/create_submit">
                        <input required="required" name="new_type" value="tst">
                        <button name="cmd[save]" value="Test hinzufügen">Hinzufügen</button>
                    </form>"#,
                    false,
                )
            }),
        )
        .route(
            "/create_submit",
            post({
                let counters = counters.clone();
                move || {
                    bump(&counters, "create_submit");
                    async { Redirect::to("/test/settings?cmdClass=ilObjTestSettingsGeneralGUI") }
                }
            }),
        )
        .route(
            "/test/settings",
            get({
                move || async {
                    page(
                        &format!(
                            r#"{}
                            <form class="il-standard-form" action="/test/save_settings">
                                <input required="required" name="ilfilehash" value="feedc0de">
                                <select name="question_set_type">
                                    <option value="FIXED_QUEST_SET" selected="selected">Fest</option>
                                </select>
                            </form>"#,
                            tab_bar()
                        ),
                        true,
                    )
                }
            }),
        )
        .route(
            "/test/save_settings",
            post({
                let counters = counters.clone();
                move || {
                    bump(&counters, "settings_submit");
                    async {
                        page(
                            &format!(
                                r#"{}
                                <form class="il-standard-form" action="/test/save_settings">
                                    <input required="required" name="ilfilehash" value="feedc0de">
                                </form>"#,
                                tab_bar()
                            ),
                            true,
                        )
                    }
                }
            }),
        )
        .route(
            "/test/questions",
            get({
                move || async {
                    page(
                        &format!(
                            r#"{}
                            <button onclick="window.location.href='/test/add_question?cmd=addQuestion'">Frage erstellen</button>
                            {}
                            <form action="/test/save_order">
                                <button name="cmd[saveOrderAndObligations]" value="Sortierung abspeichern">Speichern</button>
                            </form>"#,
                            tab_bar(),
                            question_table()
                        ),
                        true,
                    )
                }
            }),
        )
        .route(
            "/test/add_question",
            get(|| async {
                page(
                    r#"<form action="/test/create_question">
                        <button name="cmd[executeCreateQuestion]" value="Erstellen">Erstellen</button>
                    </form>"#,
                    false,
                )
            }),
        )
        .route(
            "/test/create_question",
            post({
                let counters = counters.clone();
                move || {
                    bump(&counters, "question_create");
                    async { Redirect::to("/test/question/edit?cmd=editQuestion") }
                }
            }),
        )
        .route(
            "/test/question/edit",
            get(|| async {
                page(
                    r#"<form action="/test/finalize_question">
                        <button name="cmd[saveReturn]" value="Speichern und zurückkehren">Speichern</button>
                    </form>
                    <input id="ilfilehash" name="ilfilehash" value="deadbeef">"#,
                    false,
                )
            }),
        )
        .route(
            "/test/finalize_question",
            post({
                let counters = counters.clone();
                move || {
                    bump(&counters, "question_finalize");
                    async { page("", true) }
                }
            }),
        )
        .route(
            "/test/save_order",
            post({
                let counters = counters.clone();
                move || {
                    bump(&counters, "reorder");
                    async { page("", true) }
                }
            }),
        )
}

fn sample_test() -> IliasTest {
    IliasTest {
        title: "Probeklausur".into(),
        description: "eine Probeklausur".into(),
        intro_text: "<p>Viel Erfolg!</p>".into(),
        starting_time: None,
        ending_time: None,
        number_of_tries: 1,
        questions: vec![
            TestQuestion::SingleChoice {
                title: "Auswahlfrage".into(),
                author: "robot".into(),
                summary: String::new(),
                question_html: "<p>Was stimmt?</p>".into(),
                page_design: vec![],
                shuffle: true,
                answers: vec![
                    ChoiceAnswer {
                        answer: "richtig".into(),
                        points: 2.0,
                    },
                    ChoiceAnswer {
                        answer: "falsch".into(),
                        points: 0.0,
                    },
                ],
            },
            TestQuestion::FreeformText {
                title: "Essayfrage".into(),
                author: "robot".into(),
                summary: String::new(),
                question_html: "<p>Erklären Sie.</p>".into(),
                page_design: vec![],
                points: 10.0,
            },
            TestQuestion::FileUpload {
                title: "Abgabefrage".into(),
                author: "robot".into(),
                summary: String::new(),
                question_html: "<p>Laden Sie hoch.</p>".into(),
                page_design: vec![],
                points: 5.0,
                allowed_filetypes: vec!["pdf".into()],
                max_bytes: 2_097_152,
            },
        ],
    }
}

#[tokio::test]
async fn two_folders_produce_two_full_creation_sequences() {
    let counters: Counters = Arc::new(Mutex::new(HashMap::new()));
    let router = stub_router(counters.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    let base = format!("http://{}/", addr);

    let cookie_dir = tempfile::tempdir().unwrap();
    let config = Config::default();
    let session = HttpSession::new(
        &config,
        &base,
        Box::new(StaticAuthenticator {
            credentials: Credentials {
                username: "robot".into(),
                password: "secret".into(),
            },
        }),
        &cookie_dir.path().join("cookies.txt"),
    )
    .unwrap();

    // 模式 * 匹配根下的两个文件夹
    let targets = resolve_targets(&session, &format!("{}folder/root", base), "*")
        .await
        .unwrap();
    assert_eq!(targets.len(), 2);

    let test = sample_test();
    for (index, target) in targets.iter().enumerate() {
        let folder = session.get_page(&target.url).await.unwrap();
        let ctx = TestCtx {
            target_path: target.path.clone(),
            target_index: index + 1,
            test_index: 1,
        };
        add_test(&session, &folder, &test, &ctx).await.unwrap();
    }

    let counts = counters.lock().unwrap().clone();
    assert_eq!(counts.get("create_submit"), Some(&2));
    // 设置表单的双重提交：每个测验 2 次
    assert_eq!(counts.get("settings_submit"), Some(&4));
    assert_eq!(counts.get("question_create"), Some(&6));
    assert_eq!(counts.get("question_finalize"), Some(&6));
    assert_eq!(counts.get("reorder"), Some(&2));
}
