//! 远端层级的 glob 匹配遍历 - 业务能力层
//!
//! 把斜杠分隔的逐层模式（`Übungen/*/Abgaben`）匹配到远端目录树上，
//! 返回所有命中的节点及其相对路径。逐层惰性下钻：
//! 名字不匹配的子树根本不会被抓取。
//!
//! ```text
//! 模式 foo/*/bar
//! .
//!  `- foo
//!    `- hey
//!      `- bar   ← 命中, 路径 foo/hey/bar
//!    `- baz
//!      `- bar   ← 命中, 路径 foo/baz/bar
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::infrastructure::HttpSession;
use crate::utils::text::{matches_segment, sanitize_path_segment, split_first_segment};

/// 层级里的一个远端节点
#[derive(Debug, Clone)]
pub struct RemoteNode {
    pub name: String,
    pub url: String,
}

/// 匹配到的目标
#[derive(Debug, Clone)]
pub struct MatchedTarget {
    /// 相对路径，路径段已做文件系统安全化
    pub path: PathBuf,
    /// 节点的规范 URL
    pub url: String,
}

/// 可遍历的远端层级
///
/// 用 trait 把"列出子节点"从 HTTP 会话上解耦，
/// 遍历算法因此可以在内存树上单独测试
#[async_trait(?Send)]
pub trait Hierarchy {
    async fn children(&self, url: &str) -> AppResult<Vec<RemoteNode>>;
}

#[async_trait(?Send)]
impl Hierarchy for HttpSession {
    async fn children(&self, url: &str) -> AppResult<Vec<RemoteNode>> {
        let page = self.get_page(url).await?;
        Ok(page
            .child_elements()?
            .into_iter()
            .map(|child| RemoteNode {
                name: child.name,
                url: child.url,
            })
            .collect())
    }
}

/// 遍历条目：还差哪些模式段没匹配
struct WorkItem {
    url: String,
    path: PathBuf,
    remaining: Option<String>,
}

/// 解析模式，返回所有命中的节点
///
/// # 参数
/// - `root_url`: 遍历起点
/// - `pattern`: 斜杠分隔的逐层模式；空串表示起点本身就是目标
///
/// # 返回
/// 按规范 URL 去重后的命中列表（同一节点可能被多条链接指到，保留先到者）
pub async fn resolve_targets<H: Hierarchy + ?Sized>(
    hierarchy: &H,
    root_url: &str,
    pattern: &str,
) -> AppResult<Vec<MatchedTarget>> {
    let mut matches = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut stack = vec![WorkItem {
        url: root_url.to_string(),
        path: PathBuf::new(),
        remaining: if pattern.is_empty() {
            None
        } else {
            Some(pattern.to_string())
        },
    }];

    while let Some(item) = stack.pop() {
        let Some(remaining) = item.remaining else {
            // 模式耗尽：当前节点就是一个命中
            if seen.insert(item.url.clone()) {
                matches.push(MatchedTarget {
                    path: if item.path.as_os_str().is_empty() {
                        PathBuf::from(".")
                    } else {
                        item.path
                    },
                    url: item.url,
                });
            }
            continue;
        };

        let (segment, rest) = split_first_segment(&remaining);
        let children = hierarchy.children(&item.url).await?;

        // 先过滤再下钻，日志顺序更好读；倒序入栈保持深度优先的自然顺序
        let mut surviving = Vec::new();
        for child in children {
            if matches_segment(&child.name, segment)? {
                surviving.push(child);
            }
        }
        for child in surviving.into_iter().rev() {
            stack.push(WorkItem {
                url: child.url,
                path: item.path.join(sanitize_path_segment(&child.name)),
                remaining: rest.map(str::to_string),
            });
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// 内存目录树，URL 就是节点路径
    struct MemoryTree {
        children: HashMap<String, Vec<RemoteNode>>,
    }

    impl MemoryTree {
        fn new(edges: &[(&str, &[&str])]) -> Self {
            let mut children = HashMap::new();
            for (parent, names) in edges {
                children.insert(
                    parent.to_string(),
                    names
                        .iter()
                        .map(|name| RemoteNode {
                            name: name.to_string(),
                            url: format!("{}/{}", parent, name),
                        })
                        .collect(),
                );
            }
            Self { children }
        }
    }

    #[async_trait(?Send)]
    impl Hierarchy for MemoryTree {
        async fn children(&self, url: &str) -> AppResult<Vec<RemoteNode>> {
            Ok(self.children.get(url).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn empty_pattern_matches_the_root_itself() {
        let tree = MemoryTree::new(&[("root", &["a", "b"][..])]);
        let matches = resolve_targets(&tree, "root", "").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url, "root");
        assert_eq!(matches[0].path, PathBuf::from("."));
    }

    #[tokio::test]
    async fn star_per_level_matches_the_whole_tree_level() {
        let tree = MemoryTree::new(&[
            ("root", &["a", "b"][..]),
            ("root/a", &["x", "y"][..]),
            ("root/b", &["z"][..]),
        ]);
        let matches = resolve_targets(&tree, "root", "*/*").await.unwrap();
        let mut urls: Vec<_> = matches.iter().map(|m| m.url.clone()).collect();
        urls.sort();
        assert_eq!(urls, vec!["root/a/x", "root/a/y", "root/b/z"]);
    }

    #[tokio::test]
    async fn glob_walk_finds_both_bars() {
        let tree = MemoryTree::new(&[
            ("root", &["foo", "unrelated"][..]),
            ("root/foo", &["hey", "baz"][..]),
            ("root/foo/hey", &["bar"][..]),
            ("root/foo/baz", &["bar", "other"][..]),
        ]);
        let matches = resolve_targets(&tree, "root", "foo/*/bar").await.unwrap();
        let mut paths: Vec<_> = matches
            .iter()
            .map(|m| m.path.to_string_lossy().to_string())
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["foo/baz/bar", "foo/hey/bar"]);
    }

    #[tokio::test]
    async fn names_with_slashes_are_sanitized_in_paths() {
        let tree = MemoryTree::new(&[("root", &["he/y"][..])]);
        let matches = resolve_targets(&tree, "root", "*").await.unwrap();
        assert_eq!(matches[0].path, PathBuf::from("he-y"));
    }

    #[tokio::test]
    async fn duplicate_urls_are_deduplicated() {
        // 同一节点通过两条链接暴露
        let mut tree = MemoryTree::new(&[]);
        tree.children.insert(
            "root".to_string(),
            vec![
                RemoteNode {
                    name: "a".to_string(),
                    url: "shared".to_string(),
                },
                RemoteNode {
                    name: "b".to_string(),
                    url: "shared".to_string(),
                },
            ],
        );
        let matches = resolve_targets(&tree, "root", "*").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, PathBuf::from("a"));
    }

    #[tokio::test]
    async fn non_matching_subtrees_are_never_fetched() {
        // unrelated 下没有子表，真要下钻就会得到空结果而不是报错，
        // 这里用"路径命中数"间接验证惰性：只有 foo 被展开
        let tree = MemoryTree::new(&[
            ("root", &["foo", "unrelated"][..]),
            ("root/foo", &["bar"][..]),
        ]);
        let matches = resolve_targets(&tree, "root", "foo/bar").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, PathBuf::from("foo/bar"));
    }
}
