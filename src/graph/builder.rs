use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{DataverseComponent, Dependency, Solution, TypeNameTable};

use super::dot;
use super::node::GraphvizNode;
use super::resolve::ComponentResolver;

const GRAPH_FONT: &str = "Segoe UI";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphOptions {
    /// Group the components of a solution into one sub-cluster per type.
    pub cluster_by_type: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            cluster_by_type: true,
        }
    }
}

pub fn build_overview_graph(
    solutions: &[Solution],
    dependencies: &[Dependency],
    highlighted: &BTreeSet<String>,
) -> String {
    let known = solutions
        .iter()
        .map(|solution| solution.solution_id.as_str())
        .collect::<HashSet<_>>();

    let mut output = String::from("digraph solutions {\n");
    output.push_str("    rankdir=LR;\n");
    output.push_str(&format!(
        "    node [shape=box, style=\"rounded,filled\", fontname={}, fontsize=10];\n",
        dot::quote(GRAPH_FONT)
    ));

    for solution in solutions {
        let managed = if solution.is_managed {
            "Managed"
        } else {
            "Unmanaged"
        };
        let status = format!("{managed} {}", solution.version);
        let fill = if highlighted.contains(&solution.solution_id) {
            dot::PICKED_SOLUTION_COLOR
        } else {
            dot::UNPICKED_SOLUTION_COLOR
        };
        let attributes = dot::attributes(&[
            (
                "label",
                dot::label(&[
                    solution.display_name(),
                    status.as_str(),
                    solution.publisher_name.as_deref().unwrap_or_default(),
                ]),
            ),
            ("fillcolor", dot::quote(fill)),
        ]);
        output.push_str(&format!(
            "    {} [{attributes}];\n",
            dot::quote(&solution.solution_id)
        ));
    }

    let mut seen_pairs = HashSet::new();
    for dependency in dependencies {
        let from = dependency.dependent.base_solution_id.as_str();
        let to = dependency.required.base_solution_id.as_str();
        if !known.contains(from) || !known.contains(to) {
            debug!(from, to, "dropping overview edge with unknown solution");
            continue;
        }
        if seen_pairs.insert((from, to)) {
            output.push_str(&format!("    {}\n", dot::edge(from, to)));
        }
    }

    output.push_str("}\n");
    output
}

pub fn build_dependency_graph(
    solutions: &[Solution],
    dependencies: &[Dependency],
    type_names: &TypeNameTable,
    selected: Option<&str>,
    options: &GraphOptions,
) -> String {
    let considered = dependencies
        .iter()
        .filter(|dependency| selected.is_none_or(|id| dependency.touches_solution(id)))
        .cloned()
        .collect::<Vec<_>>();

    let participants = considered
        .iter()
        .flat_map(Dependency::endpoints)
        .map(|endpoint| endpoint.base_solution_id.as_str())
        .collect::<HashSet<_>>();
    let included = solutions
        .iter()
        .filter(|solution| {
            selected == Some(solution.solution_id.as_str())
                || participants.contains(solution.solution_id.as_str())
        })
        .collect::<Vec<_>>();

    let resolver = ComponentResolver::new(&considered, type_names);
    let clusters = included
        .iter()
        .copied()
        .map(|solution| {
            let components = resolver.resolve_solution(solution, &considered);
            GraphvizNode::solution_cluster(solution, component_children(components, options))
        })
        .collect::<Vec<_>>();

    let mut nodes_by_object = HashMap::<&str, Vec<&str>>::new();
    for cluster in &clusters {
        for leaf in cluster.leaves() {
            if let Some(ref_id) = leaf.ref_id.as_deref() {
                nodes_by_object
                    .entry(ref_id)
                    .or_default()
                    .push(leaf.id.as_str());
            }
        }
    }

    let mut output = String::from("digraph dependencies {\n");
    output.push_str("    rankdir=LR;\n");
    output.push_str("    compound=true;\n");
    output.push_str(&format!(
        "    node [shape=box, style=\"rounded,filled\", fontname={}, fontsize=9];\n",
        dot::quote(GRAPH_FONT)
    ));
    for cluster in &clusters {
        cluster.render(1, &mut output);
    }

    let mut emitted = HashSet::new();
    for dependency in &considered {
        let sources = nodes_by_object.get(dependency.dependent.object_id.as_str());
        let targets = nodes_by_object.get(dependency.required.object_id.as_str());
        let (Some(sources), Some(targets)) = (sources, targets) else {
            debug!(
                dependent = %dependency.dependent.object_id,
                required = %dependency.required.object_id,
                "dropping dependency edge without resolvable nodes"
            );
            continue;
        };

        for source in sources {
            for target in targets {
                let edge = dot::edge(source, target);
                if emitted.insert(edge.clone()) {
                    output.push_str(&format!("    {edge}\n"));
                }
            }
        }
    }

    output.push_str("}\n");
    output
}

fn component_children<'a>(
    components: Vec<DataverseComponent>,
    options: &GraphOptions,
) -> Vec<GraphvizNode<'a>> {
    if !options.cluster_by_type {
        return components.into_iter().map(GraphvizNode::component).collect();
    }

    // Groups keep the order in which each type is first seen.
    let mut groups: Vec<(u32, String, Vec<DataverseComponent>)> = Vec::new();
    for component in components {
        match groups
            .iter()
            .position(|(component_type, _, _)| *component_type == component.component_type)
        {
            Some(index) => groups[index].2.push(component),
            None => groups.push((
                component.component_type,
                component.type_name.clone(),
                vec![component],
            )),
        }
    }

    groups
        .into_iter()
        .map(|(component_type, type_name, members)| {
            let solution_id = members
                .first()
                .map(|member| member.solution_id.clone())
                .unwrap_or_default();
            GraphvizNode::type_cluster(
                &solution_id,
                component_type,
                &type_name,
                members.into_iter().map(GraphvizNode::component).collect(),
            )
        })
        .collect()
}
