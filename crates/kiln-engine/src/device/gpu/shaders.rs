use std::fmt::Write;

const SPRITE_BODY: &str = include_str!("shaders/sprite.wgsl");
pub(super) const TEXT_SOURCE: &str = include_str!("shaders/text.wgsl");
pub(super) const BLIT_SOURCE: &str = include_str!("shaders/blit.wgsl");

/// Sprite shader for `budget` sampler slots per channel.
///
/// Group 1 holds `budget` diffuse textures at bindings `0..budget`, then
/// `budget` normal maps. Slot lookups are a `switch` since WGSL has no
/// dynamically indexed texture arrays without extra features.
pub(super) fn sprite_source(budget: usize) -> String {
    let mut src = String::with_capacity(SPRITE_BODY.len() + budget * 256);

    for i in 0..budget {
        let _ = writeln!(src, "@group(1) @binding({i}) var diffuse_{i}: texture_2d<f32>;");
    }
    for i in 0..budget {
        let _ = writeln!(
            src,
            "@group(1) @binding({}) var normals_{i}: texture_2d<f32>;",
            budget + i
        );
    }
    src.push('\n');

    dispatch_fn(&mut src, "sample_diffuse", "diffuse", budget, |name| {
        format!("textureSampleLevel({name}, samp, uv, 0.0)")
    });
    dispatch_fn(&mut src, "sample_normals", "normals", budget, |name| {
        format!("textureSampleLevel({name}, samp, uv, 0.0)")
    });

    let _ = writeln!(src, "fn diffuse_size(slot: u32) -> vec2<f32> {{");
    let _ = writeln!(src, "    switch slot {{");
    for i in 0..budget {
        let _ = writeln!(
            src,
            "        case {i}u: {{ return vec2<f32>(textureDimensions(diffuse_{i})); }}"
        );
    }
    let _ = writeln!(src, "        default: {{ return vec2<f32>(1.0, 1.0); }}");
    let _ = writeln!(src, "    }}\n}}\n");

    src.push_str(SPRITE_BODY);
    src
}

fn dispatch_fn(
    src: &mut String,
    name: &str,
    prefix: &str,
    budget: usize,
    sample: impl Fn(&str) -> String,
) {
    let _ = writeln!(src, "fn {name}(slot: u32, uv: vec2<f32>) -> vec4<f32> {{");
    let _ = writeln!(src, "    switch slot {{");
    for i in 0..budget {
        let _ = writeln!(
            src,
            "        case {i}u: {{ return {}; }}",
            sample(&format!("{prefix}_{i}"))
        );
    }
    let _ = writeln!(src, "        default: {{ return vec4<f32>(1.0, 1.0, 1.0, 1.0); }}");
    let _ = writeln!(src, "    }}\n}}\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_bindings_cover_both_channels() {
        let src = sprite_source(3);
        assert!(src.contains("@group(1) @binding(0) var diffuse_0"));
        assert!(src.contains("@group(1) @binding(2) var diffuse_2"));
        assert!(src.contains("@group(1) @binding(3) var normals_0"));
        assert!(src.contains("@group(1) @binding(5) var normals_2"));
        assert!(!src.contains("diffuse_3"));
        assert!(src.contains("fn vs_main"));
    }

    #[test]
    fn every_slot_has_a_case() {
        let src = sprite_source(15);
        // three dispatch functions, one case per slot each
        assert_eq!(src.matches("case 14u").count(), 3);
        assert_eq!(src.matches("case 15u").count(), 0);
    }
}
