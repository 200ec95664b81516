//! The `dot` module contains the conversion from a search automaton to a graphviz dot format.
//! The functions in this module are used for testing and debugging purposes.

use std::io::Write;

use dot_writer::{Attributes, DotWriter, RankDirection};

use super::{
    input::{Input, Name},
    nfa_compiler::CompiledNfa,
    StateID,
};

/// Render the automaton to a graphviz dot format.
/// Final states are labeled with the pattern they report.
pub(crate) fn nfa_render<W: Write>(
    compiled: &CompiledNfa,
    patterns: &[String],
    label: &str,
    output: &mut W,
) {
    let nfa = &compiled.nfa;
    let mut writer = DotWriter::from(output);
    writer.set_pretty_print(true);
    let mut digraph = writer.digraph();
    digraph
        .set_label(label)
        .set_rank_direction(RankDirection::LeftRight);
    // Nodes are created in state order, so state n is rendered as `node_n`.
    for index in 0..nfa.num_states() {
        let state = StateID::new(index as u32);
        let mut node = digraph.node_auto();
        node.set_label(&index.to_string());
        if state == nfa.start_state() {
            node.set_shape(dot_writer::Shape::Circle)
                .set_color(dot_writer::Color::Blue)
                .set_pen_width(3.0);
        }
        if let Some(pattern) = nfa.final_state(state) {
            node.set_color(dot_writer::Color::Red)
                .set_pen_width(3.0)
                .set_label(&format!(
                    "{}\n'{}'",
                    index,
                    patterns
                        .get(pattern.as_usize())
                        .map_or(String::new(), |p| p.escape_default().to_string()),
                ));
        }
    }
    for (key, targets) in nfa.transitions() {
        for target in targets {
            digraph
                .edge(
                    &format!("node_{}", key.state.as_usize()),
                    &format!("node_{}", target.as_usize()),
                )
                .attributes()
                .set_label(&edge_label(compiled, &key.input).escape_default().to_string());
        }
    }
}

fn edge_label(compiled: &CompiledNfa, input: &Input) -> String {
    match input {
        Input::Open(kind, Name::Known(id)) => format!("{}({})", kind, compiled.names.name(*id)),
        _ => input.to_string(),
    }
}
