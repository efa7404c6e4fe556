use super::navigator::SubtreeNode;

/// Spaces per level below the render root
const INDENT: &str = "    ";

/// Render a fetched subtree as a nested markdown bullet list.
///
/// Indentation is relative to `tree`, not to the document root. Extra
/// content lines and note lines hang two spaces inside their bullet, notes
/// as `> ` quotes. A node whose children were cut off gets one extra
/// bullet announcing how many there are.
pub fn render_markdown(tree: &SubtreeNode, include_notes: bool) -> String {
    let mut out = String::new();
    let mut stack = vec![(tree, 0usize)];

    while let Some((entry, level)) = stack.pop() {
        let node = &entry.node;
        let indent = INDENT.repeat(level);
        let bullet = match node.checked {
            Some(true) => "- [x] ",
            Some(false) => "- [ ] ",
            None => "- ",
        };

        let mut lines = node.content.split('\n');
        push_line(&mut out, &indent, bullet, lines.next().unwrap_or_default());
        for line in lines {
            push_line(&mut out, &indent, "  ", line);
        }

        if include_notes {
            if let Some(note) = &node.note {
                for line in note.split('\n') {
                    push_line(&mut out, &indent, "  > ", line);
                }
            }
        }

        if entry.truncated {
            let noun = if node.child_count == 1 { "child" } else { "children" };
            let marker = format!("{} more {}, id={}", node.child_count, noun, node.id);
            push_line(&mut out, &indent, INDENT, &format!("- ... ({})", marker));
        }

        for child in entry.children.iter().rev() {
            stack.push((child, level + 1));
        }
    }

    out
}

fn push_line(out: &mut String, indent: &str, prefix: &str, text: &str) {
    out.push_str(indent);
    out.push_str(prefix);
    out.push_str(text);
    out.push('\n');
}
