//! Diagnostic dump of the window tree.

use std::fmt::Write as _;

use clap::{CommandFactory, Parser};

use crate::model::types::WindowId;
use crate::model::window_node::{RootKind, WindowNode, WindowNodeMap};
use crate::model::window_root::WindowRoot;

#[derive(Parser, Debug)]
#[command(name = "dump", about = "Dump the state of the window manager")]
struct DumpArgs {
    /// List every window shown on each display.
    #[arg(short = 'a', long = "all")]
    all: bool,

    /// Show a single window in detail.
    #[arg(short = 'w', long = "window", value_name = "ID")]
    window: Option<u32>,

    /// Render each display's window forest as a tree.
    #[arg(short = 't', long = "tree")]
    tree: bool,

    /// Options forwarded to the window's own UI dump; accepted and ignored.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    ui_options: Vec<String>,
}

/// Runs one dump command. Parse failures and `-h` come back as text, the
/// same way a dump client would print them.
pub fn execute(root: &WindowRoot, args: &[String]) -> String {
    let argv = std::iter::once("dump".to_string()).chain(args.iter().cloned());
    let parsed = match DumpArgs::try_parse_from(argv) {
        Ok(parsed) => parsed,
        Err(err) => return err.to_string(),
    };
    if let Some(id) = parsed.window {
        window_detail(root, WindowId(id))
    } else if parsed.tree {
        tree(root)
    } else if parsed.all {
        all_windows(root)
    } else {
        DumpArgs::command().render_help().to_string()
    }
}

fn table_row(node: &WindowNode) -> String {
    let rect = node.rect();
    format!(
        "{:<20} {:<9} {:<7} {:<5} {:<4} {:<4} {:<4} {:<4} {:<11} [ {:<4} {:<4} {:<4} {:<4} ]",
        node.property.name(),
        node.display_id(),
        node.pid,
        node.id,
        u32::from(node.window_type()),
        u32::from(node.mode()),
        node.property.flags().bits(),
        node.z_order,
        u32::from(node.property.orientation()),
        rect.x,
        rect.y,
        rect.width,
        rect.height,
    )
}

fn all_windows(root: &WindowRoot) -> String {
    let mut out = String::new();
    let nodes = root.nodes();
    for container in root.containers() {
        let display = container.display_id();
        _ = writeln!(out, "{:-^90}", format!(" Display {display} "));
        _ = writeln!(
            out,
            "{:<20} {:<9} {:<7} {:<5} {:<4} {:<4} {:<4} {:<4} {:<11} [ {:<4} {:<4} {:<4} {:<4} ]",
            "WindowName", "DisplayId", "Pid", "WinId", "Type", "Mode", "Flag", "ZOrd",
            "Orientation", "x", "y", "w", "h",
        );
        let shown = container.z_ordered(nodes);
        for id in shown.iter().rev() {
            if let Some(node) = nodes.get(*id) {
                _ = writeln!(out, "{}", table_row(node));
            }
        }
        _ = writeln!(out, "Count: {}", shown.len());
        _ = writeln!(out, "Focus window: {}", container.focused_window());
        _ = writeln!(out, "Active window: {}", container.active_window());
        _ = writeln!(out, "Layout: {}", container.describe_layout());
    }
    let hidden: Vec<&WindowNode> = nodes.values().filter(|n| n.parent.is_none()).collect();
    if !hidden.is_empty() {
        _ = writeln!(out, "{:-^90}", " Hidden ");
        let mut hidden = hidden;
        hidden.sort_by_key(|n| n.id);
        for node in hidden {
            _ = writeln!(out, "{}", table_row(node));
        }
    }
    out
}

fn window_detail(root: &WindowRoot, id: WindowId) -> String {
    let Some(node) = root.node(id) else {
        return format!("No window with id {id}\n");
    };
    let p = &node.property;
    let mut out = String::new();
    _ = writeln!(out, "WindowName: {}", p.name());
    _ = writeln!(out, "WindowId: {}", node.id);
    _ = writeln!(out, "ParentId: {}", p.parent_id());
    _ = writeln!(out, "DisplayId: {}", node.display_id());
    _ = writeln!(out, "Pid: {}", node.pid);
    _ = writeln!(out, "Type: {}", node.window_type());
    _ = writeln!(out, "Mode: {}", node.mode());
    _ = writeln!(out, "Flags: {:?}", p.flags());
    _ = writeln!(out, "Visible: {}", node.is_visible());
    _ = writeln!(out, "Focusable: {}", p.focusable());
    _ = writeln!(out, "Touchable: {}", p.touchable());
    _ = writeln!(out, "ZOrder: {}", node.z_order);
    _ = writeln!(out, "Orientation: {}", p.orientation());
    _ = writeln!(out, "Brightness: {}", p.brightness());
    _ = writeln!(out, "Alpha: {}", p.alpha());
    _ = writeln!(out, "State: {}", node.state);
    _ = writeln!(out, "WindowRect: {}", node.rect());
    _ = writeln!(out, "RequestRect: {}", node.request_rect());
    if !node.children.is_empty() {
        let children: Vec<String> = node.children.iter().map(ToString::to_string).collect();
        _ = writeln!(out, "Children: {}", children.join(", "));
    }
    out
}

fn describe(node: &WindowNode) -> String {
    format!(
        "{} #{} {} {} z={} {}",
        node.property.name(),
        node.id,
        node.window_type(),
        node.mode(),
        node.z_order,
        node.rect()
    )
}

fn node_tree(nodes: &WindowNodeMap, id: WindowId) -> Option<ascii_tree::Tree> {
    let node = nodes.get(id)?;
    if node.children.is_empty() {
        return Some(ascii_tree::Tree::Leaf(vec![describe(node)]));
    }
    let children = node.children.iter().filter_map(|c| node_tree(nodes, *c)).collect();
    Some(ascii_tree::Tree::Node(describe(node), children))
}

fn tree(root: &WindowRoot) -> String {
    let mut out = String::new();
    let nodes = root.nodes();
    for container in root.containers() {
        let roots = RootKind::TOP_DOWN
            .iter()
            .map(|kind| {
                // Top-most child first, matching the table order.
                let children = container
                    .roots()
                    .children(*kind)
                    .iter()
                    .rev()
                    .filter_map(|id| node_tree(nodes, *id))
                    .collect();
                ascii_tree::Tree::Node(format!("{kind:?}"), children)
            })
            .collect();
        let display = ascii_tree::Tree::Node(format!("Display {}", container.display_id()), roots);
        if ascii_tree::write_tree(&mut out, &display).is_err() {
            out.push_str("<tree unavailable>\n");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::actor::agents::WindowManagerAgentController;
    use crate::common::config::LayoutSettings;
    use crate::model::node_container::ContainerDeps;
    use crate::model::types::{DisplayId, WindowLayoutMode, WindowMode, WindowType};
    use crate::model::window_property::WindowProperty;
    use crate::sys::display::{DisplayInfo, RecordingDisplayManager};
    use crate::sys::render::{InMemoryRenderService, RenderService};

    fn root_with_window() -> (WindowRoot, WindowId) {
        let render = InMemoryRenderService::new();
        let deps = ContainerDeps {
            render: render.clone(),
            display_manager: Arc::new(RecordingDisplayManager::default()),
            agents: WindowManagerAgentController::new(),
        };
        let mut root =
            WindowRoot::new(WindowLayoutMode::Cascade, LayoutSettings::default(), false, deps);
        root.add_display(DisplayInfo::new(DisplayId::DEFAULT, 1080, 2340, 1.0)).unwrap();
        let mut property = WindowProperty::new("gallery", WindowType::AppMainWindow);
        property.set_mode(WindowMode::Floating);
        let id = root
            .create_window(property, Some(render.create_surface("gallery")), None, 42, 1000)
            .unwrap();
        root.add_window_node(id).unwrap();
        (root, id)
    }

    fn args(list: &[&str]) -> Vec<String> { list.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn all_lists_shown_windows_with_their_pid() {
        let (root, _) = root_with_window();
        let out = execute(&root, &args(&["-a"]));
        let row = out.lines().find(|l| l.starts_with("gallery")).unwrap();
        assert!(row.contains(" 42 "), "{row}");
        assert!(out.contains("Count: 1"), "{out}");
    }

    #[test]
    fn window_detail_reports_unknown_ids() {
        let (root, id) = root_with_window();
        let out = execute(&root, &args(&["-w", &id.0.to_string()]));
        assert!(out.contains("WindowName: gallery"), "{out}");
        assert!(execute(&root, &args(&["-w", "999"])).contains("No window with id 999"));
    }

    #[test]
    fn tree_names_every_root() {
        let (root, _) = root_with_window();
        let out = execute(&root, &args(&["-t"]));
        for root_name in ["AboveApp", "App", "BelowApp", "gallery"] {
            assert!(out.contains(root_name), "{out}");
        }
    }

    #[test]
    fn help_is_printed_without_arguments() {
        let (root, _) = root_with_window();
        assert!(execute(&root, &[]).contains("--all"));
        assert!(execute(&root, &args(&["-h"])).contains("--window"));
    }
}
