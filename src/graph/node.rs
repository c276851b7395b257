use crate::model::{DataverseComponent, Solution};

use super::dot;

const INDENT: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphvizNodeKind {
    SolutionCluster,
    TypeCluster,
    Component,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphvizNode<'a> {
    pub id: String,
    pub stack_id: String,
    pub kind: GraphvizNodeKind,
    pub value: String,
    pub children: Vec<GraphvizNode<'a>>,
    pub ref_id: Option<String>,
    pub solution: Option<&'a Solution>,
    pub component: Option<DataverseComponent>,
}

impl<'a> GraphvizNode<'a> {
    pub fn solution_cluster(solution: &'a Solution, children: Vec<GraphvizNode<'a>>) -> Self {
        let id = solution_cluster_id(&solution.solution_id);
        let managed = if solution.is_managed {
            "Managed"
        } else {
            "Unmanaged"
        };
        let status = format!("{managed} {}", solution.version);
        let title = format!("{} ({})", solution.display_name(), status.trim_end());
        Self {
            stack_id: id.clone(),
            id,
            kind: GraphvizNodeKind::SolutionCluster,
            value: format!(
                "label={}; style=\"rounded\"; color=\"#607d8b\";",
                dot::quote(&title)
            ),
            children,
            ref_id: None,
            solution: Some(solution),
            component: None,
        }
    }

    pub fn type_cluster(
        solution_id: &str,
        component_type: u32,
        type_name: &str,
        children: Vec<GraphvizNode<'a>>,
    ) -> Self {
        Self {
            id: format!("{}_type_{component_type}", solution_cluster_id(solution_id)),
            stack_id: solution_cluster_id(solution_id),
            kind: GraphvizNodeKind::TypeCluster,
            value: format!(
                "label={}; style=\"dashed\"; color=\"#b0bec5\";",
                dot::quote(&dot::pluralize(type_name))
            ),
            children,
            ref_id: None,
            solution: None,
            component: None,
        }
    }

    pub fn component(component: DataverseComponent) -> Self {
        let value = dot::attributes(&[
            (
                "label",
                dot::label(&[
                    component.display_name.as_str(),
                    component.type_name.as_str(),
                ]),
            ),
            (
                "fillcolor",
                dot::quote(dot::component_color(component.component_type)),
            ),
        ]);
        Self {
            id: component_node_id(&component.solution_id, &component.id),
            stack_id: solution_cluster_id(&component.solution_id),
            kind: GraphvizNodeKind::Component,
            value,
            children: Vec::new(),
            ref_id: Some(component.id.clone()),
            solution: None,
            component: Some(component),
        }
    }

    pub fn is_cluster(&self) -> bool {
        self.kind != GraphvizNodeKind::Component
    }

    pub fn leaves(&self) -> Vec<&GraphvizNode<'a>> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'n>(&'n self, leaves: &mut Vec<&'n GraphvizNode<'a>>) {
        if !self.is_cluster() {
            leaves.push(self);
            return;
        }
        for child in &self.children {
            child.collect_leaves(leaves);
        }
    }

    pub fn render(&self, depth: usize, output: &mut String) {
        let indent = INDENT.repeat(depth);
        if !self.is_cluster() {
            output.push_str(&format!("{indent}{} [{}];\n", dot::quote(&self.id), self.value));
            return;
        }

        output.push_str(&format!("{indent}subgraph {} {{\n", dot::quote(&self.id)));
        output.push_str(&format!("{indent}{INDENT}{}\n", self.value));
        for child in &self.children {
            child.render(depth + 1, output);
        }
        output.push_str(&format!("{indent}}}\n"));
    }
}

pub fn solution_cluster_id(solution_id: &str) -> String {
    format!("cluster_{solution_id}")
}

pub fn component_node_id(solution_id: &str, component_id: &str) -> String {
    format!("cluster_{solution_id}_{component_id}")
}
