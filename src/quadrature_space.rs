use crate::discretization::FiniteElementDiscretization;
use crate::element::ElementType;
use crate::quadrature::{default_rule, QuadratureRule};
use rustc_hash::FxHashMap;
use std::ops::Range;

/// The integration points of one material region of a discretization.
///
/// Every element of the region owns a contiguous range of points, starting at its offset.
/// Offsets are assigned in element order on the elements owned by the partition, so that the
/// ranges of distinct elements never overlap. A space is immutable once created.
#[derive(Debug, Clone)]
pub struct PartialQuadratureSpace {
    id: usize,
    points: FxHashMap<usize, Range<usize>>,
    elements: Vec<usize>,
    rules: FxHashMap<ElementType, QuadratureRule>,
    ng: usize,
}

impl PartialQuadratureSpace {
    /// Creates the space of the elements with material attribute `id`, using `selector` to choose
    /// the quadrature rule of each element type.
    pub fn new(
        fed: &FiniteElementDiscretization,
        id: usize,
        mut selector: impl FnMut(ElementType) -> QuadratureRule,
    ) -> Self {
        let mut points = FxHashMap::default();
        let mut rules = FxHashMap::default();
        let mut elements = Vec::new();
        let mut ng = 0;
        for element in fed.elements() {
            if fed.material_attribute(element) != id {
                continue;
            }
            let element_type = fed.element_type(element);
            let rule = rules
                .entry(element_type)
                .or_insert_with(|| selector(element_type));
            let n = rule.number_of_points();
            points.insert(element, ng..ng + n);
            elements.push(element);
            ng += n;
        }
        Self {
            id,
            points,
            elements,
            rules,
            ng,
        }
    }

    /// Creates the space with the default quadrature rule of each element type.
    pub fn with_default_rules(fed: &FiniteElementDiscretization, id: usize) -> Self {
        Self::new(fed, id, default_rule)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn number_of_integration_points(&self) -> usize {
        self.ng
    }

    pub fn number_of_elements(&self) -> usize {
        self.elements.len()
    }

    /// Elements of the region, in increasing order.
    pub fn elements(&self) -> &[usize] {
        &self.elements
    }

    pub fn contains(&self, element: usize) -> bool {
        self.points.contains_key(&element)
    }

    /// Offset of the first integration point of `element`.
    ///
    /// # Panics
    ///
    /// Panics if the element does not belong to the region.
    pub fn offset(&self, element: usize) -> usize {
        self.integration_points(element).start
    }

    pub fn try_offset(&self, element: usize) -> Option<usize> {
        self.points.get(&element).map(|points| points.start)
    }

    /// The rule used for elements of the given type, if the region has any.
    pub fn integration_rule(&self, element_type: ElementType) -> Option<&QuadratureRule> {
        self.rules.get(&element_type)
    }

    /// Integration points of `element`.
    ///
    /// # Panics
    ///
    /// Panics if the element does not belong to the region.
    pub fn integration_points(&self, element: usize) -> Range<usize> {
        match self.points.get(&element) {
            Some(points) => points.clone(),
            None => treat_invalid_offset(self.id, element),
        }
    }
}

#[cold]
#[inline(never)]
fn treat_invalid_offset(id: usize, element: usize) -> ! {
    panic!(
        "element {} does not belong to the quadrature space of material {}",
        element, id
    )
}
