use std::collections::HashMap;

use super::component::{ComponentDefinition, SalaryComponent};
use super::error::SalaryStructureError;

/// An ordered, validated set of salary components.
///
/// Construction checks every precondition the calculator relies on, so a
/// `SalaryStructure` that exists can always be resolved in
/// [`resolution_order`](Self::resolution_order) without lookups failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalaryStructure {
    components: Vec<SalaryComponent>,
    /// Index of each component's base, parallel to `components`.
    bases: Vec<Option<usize>>,
    order: Vec<usize>,
    balancing: Option<usize>,
}

impl SalaryStructure {
    pub fn new(components: Vec<SalaryComponent>) -> Result<Self, SalaryStructureError> {
        for component in &components {
            component.validate()?;
        }

        let index = name_index(&components)?;

        let mut balancing: Option<usize> = None;
        for (i, component) in components.iter().enumerate() {
            if !component.is_balancing() {
                continue;
            }
            if let Some(first) = balancing {
                return Err(SalaryStructureError::MultipleBalancingComponents {
                    first: components[first].name().to_string(),
                    second: component.name().to_string(),
                });
            }
            balancing = Some(i);
        }

        let bases = base_indices(&components, &index)?;
        drop(index);
        let order = Resolver::new(&components, &bases, balancing).run()?;

        Ok(Self {
            components,
            bases,
            order,
            balancing,
        })
    }

    pub fn from_definitions(
        definitions: &[ComponentDefinition],
    ) -> Result<Self, SalaryStructureError> {
        let components = definitions
            .iter()
            .cloned()
            .map(SalaryComponent::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(components)
    }

    /// Components in the order they were given.
    pub fn components(&self) -> &[SalaryComponent] {
        &self.components
    }

    /// Component indices in dependency order: every base precedes the
    /// components computed from it, and the balancing component follows every
    /// other earning.
    pub fn resolution_order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn base_index(&self, component: usize) -> Option<usize> {
        self.bases[component]
    }

    pub fn balancing(&self) -> Option<&SalaryComponent> {
        self.balancing.map(|i| &self.components[i])
    }

    pub fn get(&self, name: &str) -> Option<&SalaryComponent> {
        self.components.iter().find(|c| c.name() == name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn definitions(&self) -> Vec<ComponentDefinition> {
        self.components.iter().map(ComponentDefinition::from).collect()
    }
}

fn name_index(
    components: &[SalaryComponent],
) -> Result<HashMap<&str, usize>, SalaryStructureError> {
    let mut index = HashMap::with_capacity(components.len());
    for (i, component) in components.iter().enumerate() {
        if index.insert(component.name(), i).is_some() {
            return Err(SalaryStructureError::DuplicateComponentName {
                name: component.name().to_string(),
            });
        }
    }
    Ok(index)
}

fn base_indices(
    components: &[SalaryComponent],
    index: &HashMap<&str, usize>,
) -> Result<Vec<Option<usize>>, SalaryStructureError> {
    components
        .iter()
        .map(|component| match component.base_component() {
            Some(base) => index.get(base).copied().map(Some).ok_or_else(|| {
                SalaryStructureError::UnknownBaseComponent {
                    component: component.name().to_string(),
                    base: base.to_string(),
                }
            }),
            None => Ok(None),
        })
        .collect()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Depth-first topological sort over the base-component graph. Roots are
/// visited in input order so unrelated components keep their position.
struct Resolver<'a> {
    components: &'a [SalaryComponent],
    bases: &'a [Option<usize>],
    balancing: Option<usize>,
    marks: Vec<Mark>,
    path: Vec<usize>,
    order: Vec<usize>,
}

impl<'a> Resolver<'a> {
    fn new(
        components: &'a [SalaryComponent],
        bases: &'a [Option<usize>],
        balancing: Option<usize>,
    ) -> Self {
        Self {
            components,
            bases,
            balancing,
            marks: vec![Mark::Unvisited; components.len()],
            path: Vec::new(),
            order: Vec::with_capacity(components.len()),
        }
    }

    fn run(mut self) -> Result<Vec<usize>, SalaryStructureError> {
        for i in 0..self.components.len() {
            self.visit(i)?;
        }
        Ok(self.order)
    }

    fn dependencies(&self, idx: usize) -> Vec<usize> {
        if self.balancing == Some(idx) {
            // the balancing component absorbs the remainder of every other earning
            (0..self.components.len())
                .filter(|&j| j != idx && self.components[j].is_earning())
                .collect()
        } else {
            self.bases[idx].into_iter().collect()
        }
    }

    fn visit(&mut self, idx: usize) -> Result<(), SalaryStructureError> {
        match self.marks[idx] {
            Mark::Done => return Ok(()),
            Mark::Visiting => return Err(self.cycle_error(idx)),
            Mark::Unvisited => {}
        }

        self.marks[idx] = Mark::Visiting;
        self.path.push(idx);
        for dep in self.dependencies(idx) {
            self.visit(dep)?;
        }
        self.path.pop();
        self.marks[idx] = Mark::Done;
        self.order.push(idx);
        Ok(())
    }

    fn cycle_error(&self, idx: usize) -> SalaryStructureError {
        let start = self.path.iter().position(|&p| p == idx).unwrap_or(0);
        let mut names: Vec<&str> = self.path[start..]
            .iter()
            .map(|&p| self.components[p].name())
            .collect();
        names.push(self.components[idx].name());

        SalaryStructureError::CyclicReference {
            path: names.join(" -> "),
        }
    }
}
