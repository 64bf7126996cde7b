//! Property tests: random sequences of structural edits keep the feed tree
//! consistent and the recycle bin last under the root.

use feedtree::config::Config;
use feedtree::model::{CategoryDraft, FeedDraft, FeedsModel, NodeId};
use feedtree::storage::{Database, FeedFormat};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    AddCategory { parent: usize },
    AddFeed { parent: usize },
    Move { node: usize, parent: usize },
    Remove { node: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<usize>().prop_map(|parent| Op::AddCategory { parent }),
        3 => any::<usize>().prop_map(|parent| Op::AddFeed { parent }),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(node, parent)| Op::Move { node, parent }),
        1 => any::<usize>().prop_map(|node| Op::Remove { node }),
    ]
}

/// Every live node in depth-first order, root first.
fn live_nodes(model: &FeedsModel) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![model.root()];
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(model.tree().children(node).iter().rev().copied());
    }
    out
}

fn pick(nodes: &[NodeId], index: usize) -> NodeId {
    nodes[index % nodes.len()]
}

async fn apply(model: &mut FeedsModel, op: &Op, serial: usize) {
    let nodes = live_nodes(model);
    // Most picks land on an invalid target; those must fail cleanly
    match *op {
        Op::AddCategory { parent } => {
            let title = format!("Category {}", serial);
            let _ = model
                .add_category(CategoryDraft::new(title), pick(&nodes, parent))
                .await;
        }
        Op::AddFeed { parent } => {
            let draft = FeedDraft::new(
                format!("Feed {}", serial),
                format!("https://feed{}.example.com/rss", serial),
                FeedFormat::Atom10,
            );
            let _ = model.add_feed(draft, pick(&nodes, parent)).await;
        }
        Op::Move { node, parent } => {
            let _ = model
                .move_item(pick(&nodes, node), pick(&nodes, parent))
                .await;
        }
        Op::Remove { node } => {
            let _ = model.remove_item(pick(&nodes, node)).await;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn structural_edits_keep_tree_consistent(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let db = Database::open(":memory:").await.unwrap();
            let mut model = FeedsModel::open(db, &Config::default()).await.unwrap();

            for (serial, op) in ops.iter().enumerate() {
                apply(&mut model, op, serial).await;

                prop_assert!(model.tree().is_consistent());
                let root = model.root();
                prop_assert_eq!(
                    model.tree().children(root).last().copied(),
                    Some(model.recycle_bin())
                );
            }

            // Whatever survived in memory is exactly what storage reloads
            let before = live_nodes(&model).len();
            model.load_from_database().await.unwrap();
            prop_assert_eq!(live_nodes(&model).len(), before);
            prop_assert!(model.tree().is_consistent());
            Ok(())
        })?;
    }
}
