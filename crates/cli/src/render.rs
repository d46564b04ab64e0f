//! Terminal rendering of chat turn updates.
//!
//! Status lines and evidence cards go to stderr; the answer text streams to
//! stdout.

use futures::StreamExt;
use profrag_chat::{UiNode, UiReceiver, UiUpdate};
use std::io::Write;
use tokio::task::JoinHandle;

/// Render updates until the turn drops its sender.
pub fn spawn_terminal_renderer(mut rx: UiReceiver, show_evidence: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            match update {
                UiUpdate::Node(node @ UiNode::Evidence { .. }) => {
                    if show_evidence {
                        eprintln!("{}\n", node.to_plain_text());
                    }
                }
                UiUpdate::Node(node) => eprintln!("{}", node.to_plain_text()),
                UiUpdate::Text(subscriber) => {
                    let deltas = subscriber.deltas();
                    tokio::pin!(deltas);
                    let mut stdout = std::io::stdout();
                    while let Some(delta) = deltas.next().await {
                        print!("{}", delta);
                        stdout.flush().ok();
                    }
                }
            }
        }
        println!();
    })
}
