use std::collections::{BTreeSet, HashMap};

use crate::model::{
    DataverseComponent, Dependency, MsDynComponent, Solution, SolutionComponent, TypeNameTable,
};

pub struct ComponentResolver<'a> {
    type_names: &'a TypeNameTable,
    dependency_names: HashMap<&'a str, &'a str>,
}

impl<'a> ComponentResolver<'a> {
    pub fn new(dependencies: &'a [Dependency], type_names: &'a TypeNameTable) -> Self {
        let mut dependency_names = HashMap::new();
        for endpoint in dependencies.iter().flat_map(Dependency::endpoints) {
            if let Some(name) = endpoint.display_name.as_deref() {
                dependency_names
                    .entry(endpoint.object_id.as_str())
                    .or_insert(name);
            }
        }

        Self {
            type_names,
            dependency_names,
        }
    }

    pub fn resolve(
        &self,
        solution_id: &str,
        components: &[SolutionComponent],
        ms_dyn_components: &[MsDynComponent],
    ) -> Vec<DataverseComponent> {
        components
            .iter()
            .map(|component| self.resolve_component(solution_id, component, ms_dyn_components))
            .collect()
    }

    pub fn resolve_component(
        &self,
        solution_id: &str,
        component: &SolutionComponent,
        ms_dyn_components: &[MsDynComponent],
    ) -> DataverseComponent {
        let ms_dyn = find_ms_dyn_component(component, ms_dyn_components);

        let display_name = ms_dyn
            .and_then(|entry| entry.name.clone())
            .or_else(|| {
                self.dependency_names
                    .get(component.id.as_str())
                    .map(|name| (*name).to_owned())
            })
            .or_else(|| component.name.clone())
            .unwrap_or_else(|| component.id.clone());

        let type_name = ms_dyn
            .and_then(|entry| entry.type_name.clone())
            .or_else(|| component.type_name.clone())
            .or_else(|| {
                self.type_names
                    .get(component.component_type)
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| component.component_type.to_string());

        DataverseComponent {
            id: component.id.clone(),
            solution_component_id: component.solution_component_id.clone(),
            solution_id: solution_id.to_owned(),
            component_type: component.component_type,
            type_name,
            display_name,
        }
    }

    pub fn resolve_solution(
        &self,
        solution: &Solution,
        dependencies: &[Dependency],
    ) -> Vec<DataverseComponent> {
        let mut components = if solution.components.is_empty() {
            solution
                .ms_dyn_components
                .iter()
                .map(|entry| SolutionComponent {
                    id: entry.id.clone(),
                    solution_component_id: None,
                    component_type: entry.component_type,
                    name: entry.name.clone(),
                    type_name: entry.type_name.clone(),
                })
                .collect::<Vec<_>>()
        } else {
            solution.components.clone()
        };

        let mut known_ids = BTreeSet::new();
        components.retain(|component| {
            let first_sighting = known_ids.insert(component.id.clone());
            if let Some(link_id) = &component.solution_component_id {
                known_ids.insert(link_id.clone());
            }
            first_sighting
        });

        for endpoint in dependencies.iter().flat_map(Dependency::endpoints) {
            if endpoint.base_solution_id != solution.solution_id
                || !known_ids.insert(endpoint.object_id.clone())
            {
                continue;
            }
            components.push(SolutionComponent {
                id: endpoint.object_id.clone(),
                solution_component_id: None,
                component_type: endpoint.component_type,
                name: endpoint.display_name.clone(),
                type_name: endpoint.type_name.clone(),
            });
        }

        self.resolve(
            &solution.solution_id,
            &components,
            &solution.ms_dyn_components,
        )
    }
}

pub fn resolve(
    solution_id: &str,
    components: &[SolutionComponent],
    ms_dyn_components: &[MsDynComponent],
    dependencies: &[Dependency],
    type_names: &TypeNameTable,
) -> Vec<DataverseComponent> {
    ComponentResolver::new(dependencies, type_names).resolve(
        solution_id,
        components,
        ms_dyn_components,
    )
}

fn find_ms_dyn_component<'m>(
    component: &SolutionComponent,
    ms_dyn_components: &'m [MsDynComponent],
) -> Option<&'m MsDynComponent> {
    ms_dyn_components.iter().find(|entry| {
        entry.id == component.id || component.solution_component_id.as_ref() == Some(&entry.id)
    })
}

#[cfg(test)]
mod tests {
    use super::{ComponentResolver, resolve};
    use crate::model::{
        COMPONENT_TYPE_CANVAS_APP, COMPONENT_TYPE_ENTITY, COMPONENT_TYPE_WORKFLOW, MsDynComponent,
        SolutionComponent, TypeNameTable,
    };
    use crate::test_support::{dependency, solution, structural};

    #[test]
    fn ms_dyn_name_wins_over_structural_name() {
        let components = vec![SolutionComponent {
            name: Some("structural name".to_owned()),
            type_name: Some("Structural Type".to_owned()),
            ..structural("obj-1", COMPONENT_TYPE_WORKFLOW)
        }];
        let ms_dyn = vec![MsDynComponent {
            id: "obj-1".to_owned(),
            name: Some("Summary name".to_owned()),
            component_type: COMPONENT_TYPE_WORKFLOW,
            type_name: Some("Cloud Flow".to_owned()),
        }];

        let resolved = resolve("A", &components, &ms_dyn, &[], &TypeNameTable::default());

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].display_name, "Summary name");
        assert_eq!(resolved[0].type_name, "Cloud Flow");
        assert_eq!(resolved[0].solution_id, "A");
    }

    #[test]
    fn summary_matches_on_solution_component_id() {
        let components = vec![SolutionComponent {
            solution_component_id: Some("link-1".to_owned()),
            ..structural("obj-1", COMPONENT_TYPE_ENTITY)
        }];
        let ms_dyn = vec![
            MsDynComponent {
                id: "link-1".to_owned(),
                name: Some("Account".to_owned()),
                component_type: COMPONENT_TYPE_ENTITY,
                type_name: None,
            },
            MsDynComponent {
                id: "link-1".to_owned(),
                name: Some("Second match".to_owned()),
                component_type: COMPONENT_TYPE_ENTITY,
                type_name: None,
            },
        ];

        let resolved = resolve("A", &components, &ms_dyn, &[], &TypeNameTable::default());

        assert_eq!(resolved[0].display_name, "Account");
        assert_eq!(resolved[0].type_name, "Entity");
        assert_eq!(resolved[0].solution_component_id.as_deref(), Some("link-1"));
    }

    #[test]
    fn dependency_name_beats_structural_name() {
        let components = vec![SolutionComponent {
            name: Some("structural".to_owned()),
            ..structural("obj-1", COMPONENT_TYPE_CANVAS_APP)
        }];
        let mut edge = dependency("obj-1", "A", "obj-2", "B");
        edge.dependent.display_name = Some("From dependency".to_owned());
        let dependencies = vec![edge];

        let resolved = resolve(
            "A",
            &components,
            &[],
            &dependencies,
            &TypeNameTable::default(),
        );

        assert_eq!(resolved[0].display_name, "From dependency");
        assert_eq!(resolved[0].type_name, "Canvas App");
    }

    #[test]
    fn unknown_component_falls_back_to_raw_id_and_numeric_type() {
        let components = vec![structural("obj-9", 12_345)];

        let resolved = resolve("A", &components, &[], &[], &TypeNameTable::empty());

        assert_eq!(resolved[0].display_name, "obj-9");
        assert_eq!(resolved[0].type_name, "12345");
    }

    #[test]
    fn resolve_solution_uses_summaries_when_structural_list_is_empty() {
        let mut owner = solution("A", "acme", "Acme");
        owner.ms_dyn_components = vec![MsDynComponent {
            id: "obj-1".to_owned(),
            name: Some("Orders".to_owned()),
            component_type: COMPONENT_TYPE_ENTITY,
            type_name: None,
        }];
        let type_names = TypeNameTable::default();
        let resolver = ComponentResolver::new(&[], &type_names);

        let resolved = resolver.resolve_solution(&owner, &[]);

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].display_name, "Orders");
        assert_eq!(resolved[0].type_name, "Entity");
    }

    #[test]
    fn resolve_solution_appends_dependency_only_endpoints_once() {
        let mut owner = solution("A", "acme", "Acme");
        owner.components = vec![
            structural("obj-1", COMPONENT_TYPE_ENTITY),
            structural("obj-1", COMPONENT_TYPE_ENTITY),
        ];
        let dependencies = vec![
            dependency("obj-7", "A", "obj-1", "A"),
            dependency("obj-7", "A", "obj-8", "B"),
        ];
        let type_names = TypeNameTable::default();
        let resolver = ComponentResolver::new(&dependencies, &type_names);

        let resolved = resolver.resolve_solution(&owner, &dependencies);

        let ids = resolved
            .iter()
            .map(|component| component.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["obj-1", "obj-7"]);
    }
}
