//! Import and export of the feed tree.
//!
//! An [`ImportTree`] is a forest of candidate categories and feeds, each
//! carrying a checked flag. Parsers of concrete file formats produce one;
//! [`FeedsModel::merge_model`] grafts it onto the live tree and
//! [`FeedsModel::export_tree`] produces one from it.

use serde::{Deserialize, Serialize};

use super::error::TreeError;
use super::feeds_model::FeedsModel;
use super::item::{CategoryDraft, FeedDraft, ItemKind, ItemPayload, NodeId};
use crate::util::strip_control_chars;

fn checked_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImportKind {
    Category(CategoryDraft),
    Feed(FeedDraft),
}

/// One candidate item and its candidate children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportItem {
    #[serde(flatten)]
    pub kind: ImportKind,
    #[serde(default = "checked_by_default")]
    pub checked: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ImportItem>,
}

impl ImportItem {
    pub fn category(draft: CategoryDraft, children: Vec<ImportItem>) -> Self {
        Self {
            kind: ImportKind::Category(draft),
            checked: true,
            children,
        }
    }

    pub fn feed(draft: FeedDraft) -> Self {
        Self {
            kind: ImportKind::Feed(draft),
            checked: true,
            children: Vec::new(),
        }
    }

    pub fn unchecked(mut self) -> Self {
        self.checked = false;
        self
    }
}

/// Candidate items below an implicit root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTree {
    pub items: Vec<ImportItem>,
}

/// Outcome of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added_categories: usize,
    pub reused_categories: usize,
    pub added_feeds: usize,
    /// Titles of candidates that could not be imported.
    pub failures: Vec<String>,
}

impl MergeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_complete() {
            "Import was completely successful.".to_string()
        } else {
            format!(
                "Import successful, but some feeds/categories were not imported due to error: {}",
                self.failures.join(", ")
            )
        }
    }
}

impl FeedsModel {
    /// Graft `candidates` onto the live tree under the root.
    ///
    /// With `checked_only`, unchecked candidates are skipped together with
    /// their subtrees. A category that cannot be added is merged into an
    /// existing category of the same title under the same parent; if there
    /// is none, that subtree is skipped and recorded as a failure. Failed
    /// feeds are recorded and the merge carries on.
    ///
    /// The update lock is held for the whole merge; a running feed update
    /// makes the merge fail before anything is added.
    pub async fn merge_model(
        &mut self,
        candidates: &ImportTree,
        checked_only: bool,
    ) -> Result<MergeReport, TreeError> {
        let _guard = self
            .update_lock()
            .try_acquire()
            .ok_or(TreeError::UpdateInProgress)?;
        let mut report = MergeReport::default();

        // Walk both trees in step without recursion
        let mut targets: Vec<NodeId> = vec![self.root()];
        let mut sources: Vec<&[ImportItem]> = vec![candidates.items.as_slice()];

        while let (Some(target), Some(source)) = (targets.pop(), sources.pop()) {
            for candidate in source {
                if checked_only && !candidate.checked {
                    continue;
                }

                match &candidate.kind {
                    ImportKind::Category(draft) => {
                        match self.create_category(draft.clone(), target).await {
                            Ok(node) => {
                                report.added_categories += 1;
                                targets.push(node);
                                sources.push(&candidate.children);
                            }
                            Err(e) => {
                                let title = strip_control_chars(&draft.title).trim().to_owned();
                                match self.tree().child_by_title(target, ItemKind::Category, &title)
                                {
                                    Some(existing) => {
                                        tracing::debug!(title = %title, "Merging into existing category");
                                        report.reused_categories += 1;
                                        targets.push(existing);
                                        sources.push(&candidate.children);
                                    }
                                    None => {
                                        tracing::warn!(title = %draft.title, error = %e, "Failed to import category");
                                        report.failures.push(draft.title.clone());
                                    }
                                }
                            }
                        }
                    }
                    ImportKind::Feed(draft) => match self.create_feed(draft.clone(), target).await {
                        Ok(_) => report.added_feeds += 1,
                        Err(e) => {
                            tracing::warn!(title = %draft.title, error = %e, "Failed to import feed");
                            report.failures.push(draft.title.clone());
                        }
                    },
                }
            }
        }

        tracing::info!(
            categories = report.added_categories,
            feeds = report.added_feeds,
            failures = report.failures.len(),
            "Merged imported items"
        );
        Ok(report)
    }

    /// Candidate tree mirroring the live tree, everything checked.
    /// The recycle bin is not exported.
    pub fn export_tree(&self) -> Result<ImportTree, TreeError> {
        let mut tree = ImportTree::default();

        // (live node, path of child indices into `tree.items` of its copy)
        let mut stack: Vec<(NodeId, Vec<usize>)> = Vec::new();
        for &child in self.tree().children(self.root()).iter().rev() {
            stack.push((child, Vec::new()));
        }

        while let Some((node, parent_path)) = stack.pop() {
            let item = self.item(node).ok_or(TreeError::UnknownNode)?;
            let kind = match &item.payload {
                ItemPayload::Category => ImportKind::Category(CategoryDraft {
                    title: item.title.clone(),
                    description: item.description.clone(),
                    icon: item.icon.clone(),
                }),
                ItemPayload::Feed(feed) => ImportKind::Feed(FeedDraft {
                    title: item.title.clone(),
                    description: item.description.clone(),
                    icon: item.icon.clone(),
                    url: feed.url.clone(),
                    encoding: feed.encoding.clone(),
                    format: feed.format,
                    auto_update: feed.auto_update,
                }),
                ItemPayload::Root | ItemPayload::RecycleBin => continue,
            };

            let siblings = children_at(&mut tree.items, &parent_path)?;
            siblings.push(ImportItem {
                kind,
                checked: true,
                children: Vec::new(),
            });

            let mut path = parent_path;
            path.push(siblings.len() - 1);
            for &child in self.tree().children(node).iter().rev() {
                stack.push((child, path.clone()));
            }
        }

        Ok(tree)
    }
}

/// Children list of the candidate reached by following `path` from `items`.
fn children_at<'a>(
    mut items: &'a mut Vec<ImportItem>,
    path: &[usize],
) -> Result<&'a mut Vec<ImportItem>, TreeError> {
    for &index in path {
        items = &mut items.get_mut(index).ok_or(TreeError::UnknownNode)?.children;
    }
    Ok(items)
}
