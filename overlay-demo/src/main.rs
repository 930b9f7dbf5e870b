//! Headless walkthrough of an overlay scope.
//!
//! Renders overlays as plain text frames on stdout. Buttons drawn by the
//! overlays are registered with a tiny click table so the script can press
//! them the way a user would.

use std::collections::HashMap;
use std::fs::File;
use std::sync::{Arc, Mutex};

use overlay::prelude::*;
use simplelog::{Config, LevelFilter, WriteLogger};

type Handler = Arc<dyn Fn() + Send + Sync>;

/// Buttons currently on screen, by label.
#[derive(Clone, Default)]
struct Buttons {
    handlers: Arc<Mutex<HashMap<String, Handler>>>,
}

impl Buttons {
    fn button(&self, label: &str, on_click: impl Fn() + Send + Sync + 'static) -> String {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(label.to_string(), Arc::new(on_click));
        format!("[{}]", label)
    }

    fn click(&self, label: &str) {
        let handler = self
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(label);
        match handler {
            Some(handler) => {
                println!("> click {}", label);
                handler();
            }
            None => println!("> click {} (no such button)", label),
        }
    }
}

fn print_frame(frame: Option<OverlayRoot<String>>) {
    match frame {
        None => println!("  (no overlays)"),
        Some(root) => {
            println!("  <{}>", root.container_id);
            for child in &root.children {
                println!("    {:?} {}: {}", child.kind, child.id, child.node);
            }
        }
    }
}

fn toast(overlay: &Overlay<String>, buttons: &Buttons, message: &'static str) -> CloseFn {
    let buttons = buttons.clone();
    overlay.open(move |props| {
        let close = props.on_request_close.clone();
        let dismiss = buttons.button(&format!("dismiss {}", message), move || close.close());
        format!("toast \"{}\" {}", message, dismiss)
    })
}

fn confirm(
    overlay: &Overlay<String>,
    buttons: &Buttons,
    question: &'static str,
) -> OverlayCompletion<bool> {
    let buttons = buttons.clone();
    overlay.open_async(move |props: &AsyncOverlayProps<bool>| {
        let yes = props.resolve.clone();
        let no = props.resolve.clone();
        format!(
            "confirm \"{}\" {} {}",
            question,
            buttons.button("yes", move || yes.resolve(true)),
            buttons.button("no", move || no.resolve(false)),
        )
    })
}

#[tokio::main]
async fn main() {
    let log_file = File::create("overlay-demo.log").expect("Failed to create log file");
    WriteLogger::init(LevelFilter::Debug, Config::default(), log_file)
        .expect("Failed to initialize logger");

    let overlay: Overlay<String> =
        Overlay::with_config(OverlayConfig::new("demo").sequential_ids("ov"));
    let buttons = Buttons::default();

    // Frames are printed synchronously; mounting an overlay registers its buttons.
    let subscription = overlay.renderer().bind(print_frame);

    let saved = toast(&overlay, &buttons, "Settings saved");
    let answer = confirm(&overlay, &buttons, "Delete 3 records?");

    let clicker = buttons.clone();
    tokio::spawn(async move {
        clicker.click("yes");
    });

    let confirmed = answer.await;
    log::info!("Delete confirmed: {}", confirmed);
    println!("confirm resolved: {}", confirmed);

    buttons.click("dismiss Settings saved");
    saved.close();

    // Closing without an answer: the plain completion would wait forever.
    let ignored = confirm(&overlay, &buttons, "Discard draft?").dismissible();
    overlay.close_all();
    match ignored.await {
        Ok(value) => println!("discard resolved: {}", value),
        Err(e) => println!("discard: {}", e),
    }

    subscription.unsubscribe();
    overlay.dispose();
    log::info!("Demo finished");
}
