//! Name-keyed material overrides applied to a freshly loaded model.
//!
//! Rules are evaluated top to bottom for every surface and *all* matching
//! rules apply, so a later rule overwrites what an earlier one wrote. Every
//! write is an absolute assignment, which makes patching idempotent.

use glam::Vec3;

use crate::scene::{SceneNode, Surface, hex_to_linear};

/// Predicate on a material name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaterialMatch {
    Any,
    Equals(String),
    Contains(String),
}

impl MaterialMatch {
    pub fn equals(name: impl Into<String>) -> Self {
        MaterialMatch::Equals(name.into())
    }

    pub fn contains(fragment: impl Into<String>) -> Self {
        MaterialMatch::Contains(fragment.into())
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            MaterialMatch::Any => true,
            MaterialMatch::Equals(expected) => name == expected,
            MaterialMatch::Contains(fragment) => name.contains(fragment.as_str()),
        }
    }
}

/// An absolute property assignment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaterialWrite {
    Color(Vec3),
    Roughness(f32),
    Metalness(f32),
    Emissive(Vec3),
    EmissiveIntensity(f32),
    Opacity(f32),
    Transparent(bool),
    Ior(f32),
    IridescenceIor(f32),
    Thickness(f32),
    CastShadow(bool),
    ReceiveShadow(bool),
}

impl MaterialWrite {
    fn apply(self, surface: &mut Surface) {
        let material = &mut surface.material;
        match self {
            MaterialWrite::Color(color) => material.color = color,
            MaterialWrite::Roughness(v) => material.roughness = v,
            MaterialWrite::Metalness(v) => material.metalness = v,
            MaterialWrite::Emissive(color) => material.emissive = color,
            MaterialWrite::EmissiveIntensity(v) => material.emissive_intensity = v,
            MaterialWrite::Opacity(v) => material.opacity = v,
            MaterialWrite::Transparent(v) => material.transparent = v,
            MaterialWrite::Ior(v) => material.ior = v,
            MaterialWrite::IridescenceIor(v) => material.iridescence_ior = v,
            MaterialWrite::Thickness(v) => material.thickness = v,
            MaterialWrite::CastShadow(v) => surface.cast_shadow = v,
            MaterialWrite::ReceiveShadow(v) => surface.receive_shadow = v,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialRule {
    pub matcher: MaterialMatch,
    pub writes: Vec<MaterialWrite>,
}

impl MaterialRule {
    pub fn new(matcher: MaterialMatch) -> Self {
        Self {
            matcher,
            writes: Vec::new(),
        }
    }

    pub fn set(mut self, write: MaterialWrite) -> Self {
        self.writes.push(write);
        self
    }
}

/// Outcome of one [`MaterialPatcher::apply`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub surfaces: usize,
    /// Matching surfaces per rule, in rule order.
    pub rule_hits: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct MaterialPatcher {
    rules: Vec<MaterialRule>,
}

impl MaterialPatcher {
    pub fn new(rules: Vec<MaterialRule>) -> Self {
        Self { rules }
    }

    /// The loft's material look.
    ///
    /// `equals` rules compare whole names, so `frame-emit-art` skips the
    /// `frame-emit` rule and ends on the `art` rule's emissive intensity of 3.
    pub fn loft() -> Self {
        use MaterialWrite::*;

        Self::new(vec![
            MaterialRule::new(MaterialMatch::Any)
                .set(Color(Vec3::splat(0.07)))
                .set(Roughness(0.4))
                .set(CastShadow(true))
                .set(ReceiveShadow(true)),
            MaterialRule::new(MaterialMatch::equals("Material.003")).set(Roughness(1.0)),
            MaterialRule::new(MaterialMatch::equals("table-lamp"))
                .set(Emissive(hex_to_linear(0xE74D00)))
                .set(EmissiveIntensity(5.0)),
            MaterialRule::new(MaterialMatch::contains("floor")).set(Roughness(0.003)),
            MaterialRule::new(MaterialMatch::equals("glass"))
                .set(Roughness(0.11))
                .set(Transparent(true))
                .set(Ior(1.33))
                .set(IridescenceIor(2.0))
                .set(Thickness(1.0))
                .set(Opacity(0.2))
                .set(EmissiveIntensity(0.0)),
            MaterialRule::new(MaterialMatch::equals("frame-emit")).set(EmissiveIntensity(3.0)),
            MaterialRule::new(MaterialMatch::contains("art"))
                .set(EmissiveIntensity(3.0))
                .set(Roughness(0.3)),
            MaterialRule::new(MaterialMatch::equals("lamp")).set(EmissiveIntensity(0.5)),
        ])
    }

    pub fn rules(&self) -> &[MaterialRule] {
        &self.rules
    }

    /// Applies every matching rule to every surface under `root`, in rule order.
    pub fn apply(&self, root: &mut SceneNode) -> PatchReport {
        let mut report = PatchReport {
            surfaces: 0,
            rule_hits: vec![0; self.rules.len()],
        };

        root.visit_surfaces_mut(&mut |surface| {
            report.surfaces += 1;
            for (rule, hits) in self.rules.iter().zip(report.rule_hits.iter_mut()) {
                if rule.matcher.matches(&surface.material.name) {
                    *hits += 1;
                    for write in &rule.writes {
                        write.apply(surface);
                    }
                }
            }
        });

        log::debug!(
            "patched {} surfaces under `{}`, rule hits {:?}",
            report.surfaces,
            root.name,
            report.rule_hits
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::scene::{Material, MeshData};

    fn model(names: &[&str]) -> SceneNode {
        let geometry = Arc::new(MeshData::sphere(1.0, 4, 2));
        let surfaces = names
            .iter()
            .map(|name| Surface::new(geometry.clone(), Material::named(*name)))
            .collect();
        SceneNode::group("model").with_child(SceneNode::mesh("mesh", surfaces))
    }

    fn material<'a>(root: &'a SceneNode, name: &str) -> &'a Surface {
        root.find("mesh")
            .and_then(|mesh| mesh.surfaces().iter().find(|s| s.material.name == name))
            .unwrap()
    }

    #[test]
    fn baseline_applies_to_every_surface() {
        let mut root = model(&["wall", "Material.003"]);
        let report = MaterialPatcher::loft().apply(&mut root);

        assert_eq!(report.surfaces, 2);
        assert_eq!(report.rule_hits[0], 2);
        let wall = material(&root, "wall");
        assert_eq!(wall.material.color, Vec3::splat(0.07));
        assert_eq!(wall.material.roughness, 0.4);
        assert!(wall.cast_shadow && wall.receive_shadow);
        assert_eq!(material(&root, "Material.003").material.roughness, 1.0);
    }

    #[test]
    fn later_rules_overwrite_earlier_writes() {
        let mut root = model(&["frame-emit"]);
        let patcher = MaterialPatcher::new(vec![
            MaterialRule::new(MaterialMatch::contains("emit"))
                .set(MaterialWrite::EmissiveIntensity(3.0)),
            MaterialRule::new(MaterialMatch::equals("frame-emit"))
                .set(MaterialWrite::EmissiveIntensity(5.0)),
        ]);

        patcher.apply(&mut root);

        assert_eq!(material(&root, "frame-emit").material.emissive_intensity, 5.0);
    }

    #[test]
    fn exact_match_does_not_fire_on_longer_names() {
        let mut root = model(&["frame-emit-art"]);
        let patcher = MaterialPatcher::new(vec![
            MaterialRule::new(MaterialMatch::contains("art"))
                .set(MaterialWrite::EmissiveIntensity(3.0)),
            MaterialRule::new(MaterialMatch::equals("frame-emit"))
                .set(MaterialWrite::EmissiveIntensity(5.0)),
        ]);

        let report = patcher.apply(&mut root);

        assert_eq!(report.rule_hits, vec![1, 0]);
        assert_eq!(material(&root, "frame-emit-art").material.emissive_intensity, 3.0);
    }

    #[test]
    fn loft_rules_treat_frame_emit_art_as_art() {
        let mut root = model(&["frame-emit-art", "frame-emit"]);
        let report = MaterialPatcher::loft().apply(&mut root);

        let art = &material(&root, "frame-emit-art").material;
        assert_eq!(art.emissive_intensity, 3.0);
        assert_eq!(art.roughness, 0.3);
        // Rule 5 is `equals("frame-emit")`: only the exact name hits it.
        assert_eq!(report.rule_hits[5], 1);
        assert_eq!(material(&root, "frame-emit").material.roughness, 0.4);
    }

    #[test]
    fn artwork_overrides_baseline_roughness() {
        let mut root = model(&["artwork-01"]);
        MaterialPatcher::loft().apply(&mut root);

        let art = &material(&root, "artwork-01").material;
        assert_eq!(art.roughness, 0.3);
        assert_eq!(art.emissive_intensity, 3.0);
    }

    #[test]
    fn glass_gets_transmission_settings() {
        let mut root = model(&["glass"]);
        MaterialPatcher::loft().apply(&mut root);

        let glass = &material(&root, "glass").material;
        assert!(glass.transparent);
        assert_eq!(glass.opacity, 0.2);
        assert_eq!(glass.ior, 1.33);
        assert_eq!(glass.roughness, 0.11);
        assert_eq!(glass.emissive_intensity, 0.0);
    }

    #[test]
    fn floor_match_is_substring() {
        let mut root = model(&["wood-floor", "floorboard"]);
        MaterialPatcher::loft().apply(&mut root);

        assert_eq!(material(&root, "wood-floor").material.roughness, 0.003);
        assert_eq!(material(&root, "floorboard").material.roughness, 0.003);
    }

    #[test]
    fn patching_twice_is_idempotent() {
        let names = ["glass", "table-lamp", "artwork", "lamp", "plain"];
        let mut once = model(&names);
        let patcher = MaterialPatcher::loft();
        patcher.apply(&mut once);

        let mut twice = once.clone();
        patcher.apply(&mut twice);

        for name in names {
            assert_eq!(material(&once, name).material, material(&twice, name).material);
        }
    }

    #[test]
    fn unmatched_names_only_get_baseline() {
        let mut root = model(&["lamp-shade"]);
        let report = MaterialPatcher::loft().apply(&mut root);

        assert_eq!(report.rule_hits.iter().sum::<usize>(), 1);
        assert_eq!(material(&root, "lamp-shade").material.emissive_intensity, 1.0);
    }
}
