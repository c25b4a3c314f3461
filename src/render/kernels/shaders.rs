//! 内核 WGSL 源码
//!
//! 每个内核的模块 = `PRELUDE` + 自身片段。绑定约定：
//! `@binding(0)` Uniform 块，`@binding(1)` 采样器，`@binding(2..)` 输入纹理。
//! 纹理坐标原点在左上角，`+y` 邻居为 `uv + (0, texel.y)`。
//!
//! 特性开关使用 `override` 常量；所有采样都在分支之前完成，
//! 分支只作用于算术结果，以满足统一控制流的要求。

pub(crate) const PRELUDE: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

// 全屏三角形顶点着色器
@vertex
fn vs_fullscreen(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var out: VertexOutput;

    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);

    out.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(x, 1.0 - y);

    return out;
}

@group(0) @binding(1) var field_sampler: sampler;
"#;

pub(crate) const COPY: &str = r#"
@group(0) @binding(2) var u_source: texture_2d<f32>;

@fragment
fn fs_copy(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(u_source, field_sampler, in.uv);
}
"#;

pub(crate) const CLEAR: &str = r#"
struct ClearUniforms {
    value: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0) var<uniform> u: ClearUniforms;
@group(0) @binding(2) var u_source: texture_2d<f32>;

@fragment
fn fs_clear(in: VertexOutput) -> @location(0) vec4<f32> {
    return u.value * textureSample(u_source, field_sampler, in.uv);
}
"#;

pub(crate) const SPLAT: &str = r#"
struct SplatUniforms {
    point: vec2<f32>,
    aspect_ratio: f32,
    radius: f32,
    color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: SplatUniforms;
@group(0) @binding(2) var u_target: texture_2d<f32>;

@fragment
fn fs_splat(in: VertexOutput) -> @location(0) vec4<f32> {
    var p = in.uv - u.point;
    p.x = p.x * u.aspect_ratio;
    let splat = exp(-dot(p, p) / u.radius) * u.color.xyz;
    let base = textureSample(u_target, field_sampler, in.uv).xyz;
    return vec4<f32>(base + splat, 1.0);
}
"#;

pub(crate) const CURL: &str = r#"
struct TexelUniforms {
    texel_size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> u: TexelUniforms;
@group(0) @binding(2) var u_velocity: texture_2d<f32>;

@fragment
fn fs_curl(in: VertexOutput) -> @location(0) vec4<f32> {
    let t = u.texel_size;
    let l = textureSample(u_velocity, field_sampler, in.uv - vec2<f32>(t.x, 0.0)).y;
    let r = textureSample(u_velocity, field_sampler, in.uv + vec2<f32>(t.x, 0.0)).y;
    let top = textureSample(u_velocity, field_sampler, in.uv + vec2<f32>(0.0, t.y)).x;
    let bottom = textureSample(u_velocity, field_sampler, in.uv - vec2<f32>(0.0, t.y)).x;
    let vorticity = r - l - top + bottom;
    return vec4<f32>(0.5 * vorticity, 0.0, 0.0, 1.0);
}
"#;

pub(crate) const VORTICITY: &str = r#"
struct VorticityUniforms {
    texel_size: vec2<f32>,
    curl: f32,
    dt: f32,
};

@group(0) @binding(0) var<uniform> u: VorticityUniforms;
@group(0) @binding(2) var u_velocity: texture_2d<f32>;
@group(0) @binding(3) var u_curl: texture_2d<f32>;

@fragment
fn fs_vorticity(in: VertexOutput) -> @location(0) vec4<f32> {
    let t = u.texel_size;
    let l = textureSample(u_curl, field_sampler, in.uv - vec2<f32>(t.x, 0.0)).x;
    let r = textureSample(u_curl, field_sampler, in.uv + vec2<f32>(t.x, 0.0)).x;
    let top = textureSample(u_curl, field_sampler, in.uv + vec2<f32>(0.0, t.y)).x;
    let bottom = textureSample(u_curl, field_sampler, in.uv - vec2<f32>(0.0, t.y)).x;
    let c = textureSample(u_curl, field_sampler, in.uv).x;
    var velocity = textureSample(u_velocity, field_sampler, in.uv).xy;

    var force = 0.5 * vec2<f32>(abs(top) - abs(bottom), abs(r) - abs(l));
    force = force / (length(force) + 0.0001);
    force = force * u.curl * c;
    force.y = -force.y;

    velocity = velocity + force * u.dt;
    velocity = min(max(velocity, vec2<f32>(-1000.0)), vec2<f32>(1000.0));
    return vec4<f32>(velocity, 0.0, 1.0);
}
"#;

pub(crate) const DIVERGENCE: &str = r#"
struct TexelUniforms {
    texel_size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> u: TexelUniforms;
@group(0) @binding(2) var u_velocity: texture_2d<f32>;

@fragment
fn fs_divergence(in: VertexOutput) -> @location(0) vec4<f32> {
    let t = u.texel_size;
    let uv_l = in.uv - vec2<f32>(t.x, 0.0);
    let uv_r = in.uv + vec2<f32>(t.x, 0.0);
    let uv_t = in.uv + vec2<f32>(0.0, t.y);
    let uv_b = in.uv - vec2<f32>(0.0, t.y);

    var l = textureSample(u_velocity, field_sampler, uv_l).x;
    var r = textureSample(u_velocity, field_sampler, uv_r).x;
    var top = textureSample(u_velocity, field_sampler, uv_t).y;
    var bottom = textureSample(u_velocity, field_sampler, uv_b).y;
    let c = textureSample(u_velocity, field_sampler, in.uv).xy;

    // 边界外的邻居复用中心分量
    l = select(l, c.x, uv_l.x < 0.0);
    r = select(r, c.x, uv_r.x > 1.0);
    top = select(top, c.y, uv_t.y > 1.0);
    bottom = select(bottom, c.y, uv_b.y < 0.0);

    let divergence = 0.5 * (r - l + top - bottom);
    return vec4<f32>(divergence, 0.0, 0.0, 1.0);
}
"#;

pub(crate) const PRESSURE: &str = r#"
struct TexelUniforms {
    texel_size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> u: TexelUniforms;
@group(0) @binding(2) var u_pressure: texture_2d<f32>;
@group(0) @binding(3) var u_divergence: texture_2d<f32>;

@fragment
fn fs_pressure(in: VertexOutput) -> @location(0) vec4<f32> {
    let t = u.texel_size;
    let l = textureSample(u_pressure, field_sampler, in.uv - vec2<f32>(t.x, 0.0)).x;
    let r = textureSample(u_pressure, field_sampler, in.uv + vec2<f32>(t.x, 0.0)).x;
    let top = textureSample(u_pressure, field_sampler, in.uv + vec2<f32>(0.0, t.y)).x;
    let bottom = textureSample(u_pressure, field_sampler, in.uv - vec2<f32>(0.0, t.y)).x;
    let divergence = textureSample(u_divergence, field_sampler, in.uv).x;
    let pressure = (l + r + bottom + top - divergence) * 0.25;
    return vec4<f32>(pressure, 0.0, 0.0, 1.0);
}
"#;

pub(crate) const GRADIENT_SUBTRACT: &str = r#"
struct TexelUniforms {
    texel_size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> u: TexelUniforms;
@group(0) @binding(2) var u_pressure: texture_2d<f32>;
@group(0) @binding(3) var u_velocity: texture_2d<f32>;

@fragment
fn fs_gradient_subtract(in: VertexOutput) -> @location(0) vec4<f32> {
    let t = u.texel_size;
    let l = textureSample(u_pressure, field_sampler, in.uv - vec2<f32>(t.x, 0.0)).x;
    let r = textureSample(u_pressure, field_sampler, in.uv + vec2<f32>(t.x, 0.0)).x;
    let top = textureSample(u_pressure, field_sampler, in.uv + vec2<f32>(0.0, t.y)).x;
    let bottom = textureSample(u_pressure, field_sampler, in.uv - vec2<f32>(0.0, t.y)).x;
    var velocity = textureSample(u_velocity, field_sampler, in.uv).xy;
    velocity = velocity - vec2<f32>(r - l, top - bottom);
    return vec4<f32>(velocity, 0.0, 1.0);
}
"#;

pub(crate) const ADVECTION: &str = r#"
struct AdvectionUniforms {
    texel_size: vec2<f32>,
    dye_texel_size: vec2<f32>,
    dt: f32,
    dissipation: f32,
    _pad: vec2<f32>,
};

override MANUAL_FILTERING: bool = false;

@group(0) @binding(0) var<uniform> u: AdvectionUniforms;
@group(0) @binding(2) var u_velocity: texture_2d<f32>;
@group(0) @binding(3) var u_source: texture_2d<f32>;

// 4 点双线性插值，用于不支持硬件线性过滤的格式
fn bilerp(tex: texture_2d<f32>, uv: vec2<f32>, texel: vec2<f32>) -> vec4<f32> {
    let st = uv / texel - 0.5;
    let iuv = floor(st);
    let fuv = fract(st);

    let a = textureSampleLevel(tex, field_sampler, (iuv + vec2<f32>(0.5, 0.5)) * texel, 0.0);
    let b = textureSampleLevel(tex, field_sampler, (iuv + vec2<f32>(1.5, 0.5)) * texel, 0.0);
    let c = textureSampleLevel(tex, field_sampler, (iuv + vec2<f32>(0.5, 1.5)) * texel, 0.0);
    let d = textureSampleLevel(tex, field_sampler, (iuv + vec2<f32>(1.5, 1.5)) * texel, 0.0);

    return mix(mix(a, b, fuv.x), mix(c, d, fuv.x), fuv.y);
}

@fragment
fn fs_advection(in: VertexOutput) -> @location(0) vec4<f32> {
    let linear_velocity = textureSampleLevel(u_velocity, field_sampler, in.uv, 0.0).xy;
    let manual_velocity = bilerp(u_velocity, in.uv, u.texel_size).xy;
    let velocity = select(linear_velocity, manual_velocity, MANUAL_FILTERING);

    let coord = in.uv - u.dt * velocity * u.texel_size;
    let linear_result = textureSampleLevel(u_source, field_sampler, coord, 0.0);
    let manual_result = bilerp(u_source, coord, u.dye_texel_size);
    let result = select(linear_result, manual_result, MANUAL_FILTERING);

    return u.dissipation * result;
}
"#;

pub(crate) const BLOOM_PREFILTER: &str = r#"
struct BloomPrefilterUniforms {
    curve: vec3<f32>,
    threshold: f32,
};

@group(0) @binding(0) var<uniform> u: BloomPrefilterUniforms;
@group(0) @binding(2) var u_source: texture_2d<f32>;

@fragment
fn fs_bloom_prefilter(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = textureSample(u_source, field_sampler, in.uv).rgb;
    let br = max(c.r, max(c.g, c.b));
    var rq = clamp(br - u.curve.x, 0.0, u.curve.y);
    rq = u.curve.z * rq * rq;
    let scaled = c * max(rq, br - u.threshold) / max(br, 0.0001);
    return vec4<f32>(scaled, 0.0);
}
"#;

pub(crate) const BLOOM_BLUR: &str = r#"
struct TexelUniforms {
    texel_size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> u: TexelUniforms;
@group(0) @binding(2) var u_source: texture_2d<f32>;

@fragment
fn fs_bloom_blur(in: VertexOutput) -> @location(0) vec4<f32> {
    let t = u.texel_size;
    var sum = textureSample(u_source, field_sampler, in.uv - vec2<f32>(t.x, 0.0));
    sum = sum + textureSample(u_source, field_sampler, in.uv + vec2<f32>(t.x, 0.0));
    sum = sum + textureSample(u_source, field_sampler, in.uv + vec2<f32>(0.0, t.y));
    sum = sum + textureSample(u_source, field_sampler, in.uv - vec2<f32>(0.0, t.y));
    return sum * 0.25;
}
"#;

pub(crate) const BLOOM_FINAL: &str = r#"
struct BloomFinalUniforms {
    texel_size: vec2<f32>,
    intensity: f32,
    _pad: f32,
};

@group(0) @binding(0) var<uniform> u: BloomFinalUniforms;
@group(0) @binding(2) var u_source: texture_2d<f32>;

@fragment
fn fs_bloom_final(in: VertexOutput) -> @location(0) vec4<f32> {
    let t = u.texel_size;
    var sum = textureSample(u_source, field_sampler, in.uv - vec2<f32>(t.x, 0.0));
    sum = sum + textureSample(u_source, field_sampler, in.uv + vec2<f32>(t.x, 0.0));
    sum = sum + textureSample(u_source, field_sampler, in.uv + vec2<f32>(0.0, t.y));
    sum = sum + textureSample(u_source, field_sampler, in.uv - vec2<f32>(0.0, t.y));
    return sum * 0.25 * u.intensity;
}
"#;

pub(crate) const SUNRAYS_MASK: &str = r#"
@group(0) @binding(2) var u_source: texture_2d<f32>;

@fragment
fn fs_sunrays_mask(in: VertexOutput) -> @location(0) vec4<f32> {
    var c = textureSample(u_source, field_sampler, in.uv);
    let br = max(c.r, max(c.g, c.b));
    c.a = 1.0 - min(max(br * 20.0, 0.0), 0.8);
    return c;
}
"#;

pub(crate) const SUNRAYS: &str = r#"
struct SunraysUniforms {
    weight: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

const ITERATIONS: i32 = 16;
const DENSITY: f32 = 0.3;
const DECAY: f32 = 0.95;
const EXPOSURE: f32 = 0.7;

@group(0) @binding(0) var<uniform> u: SunraysUniforms;
@group(0) @binding(2) var u_source: texture_2d<f32>;

@fragment
fn fs_sunrays(in: VertexOutput) -> @location(0) vec4<f32> {
    var coord = in.uv;
    let dir = (in.uv - 0.5) * (DENSITY / f32(ITERATIONS));

    var illumination_decay = 1.0;
    var color = textureSampleLevel(u_source, field_sampler, in.uv, 0.0).a;

    for (var i = 0; i < ITERATIONS; i++) {
        coord = coord - dir;
        let tap = textureSampleLevel(u_source, field_sampler, coord, 0.0).a;
        color = color + tap * illumination_decay * u.weight;
        illumination_decay = illumination_decay * DECAY;
    }

    return vec4<f32>(color * EXPOSURE, 0.0, 0.0, 1.0);
}
"#;

pub(crate) const BLUR: &str = r#"
struct TexelUniforms {
    texel_size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> u: TexelUniforms;
@group(0) @binding(2) var u_source: texture_2d<f32>;

// 5-tap 高斯核折叠为 3 次线性采样；texel_size 只在模糊方向上非零
@fragment
fn fs_blur(in: VertexOutput) -> @location(0) vec4<f32> {
    let offset = u.texel_size * 1.33333333;
    var sum = textureSample(u_source, field_sampler, in.uv) * 0.29411764;
    sum = sum + textureSample(u_source, field_sampler, in.uv - offset) * 0.35294117;
    sum = sum + textureSample(u_source, field_sampler, in.uv + offset) * 0.35294117;
    return sum;
}
"#;

pub(crate) const DISPLAY: &str = r#"
struct DisplayUniforms {
    texel_size: vec2<f32>,
    dither_scale: vec2<f32>,
};

override SHADING: bool = false;
override BLOOM: bool = false;
override SUNRAYS: bool = false;

@group(0) @binding(0) var<uniform> u: DisplayUniforms;
@group(0) @binding(2) var u_source: texture_2d<f32>;
@group(0) @binding(3) var u_bloom: texture_2d<f32>;
@group(0) @binding(4) var u_sunrays: texture_2d<f32>;
@group(0) @binding(5) var u_dither: texture_2d<f32>;

fn linear_to_gamma(color: vec3<f32>) -> vec3<f32> {
    let c = max(color, vec3<f32>(0.0));
    return max(1.055 * pow(c, vec3<f32>(0.416666667)) - 0.055, vec3<f32>(0.0));
}

@fragment
fn fs_display(in: VertexOutput) -> @location(0) vec4<f32> {
    let t = u.texel_size;
    var c = textureSample(u_source, field_sampler, in.uv).rgb;
    let lc = textureSample(u_source, field_sampler, in.uv - vec2<f32>(t.x, 0.0)).rgb;
    let rc = textureSample(u_source, field_sampler, in.uv + vec2<f32>(t.x, 0.0)).rgb;
    let tc = textureSample(u_source, field_sampler, in.uv + vec2<f32>(0.0, t.y)).rgb;
    let bc = textureSample(u_source, field_sampler, in.uv - vec2<f32>(0.0, t.y)).rgb;
    var bloom = textureSample(u_bloom, field_sampler, in.uv).rgb;
    let sunrays = textureSample(u_sunrays, field_sampler, in.uv).r;
    let noise = textureSample(u_dither, field_sampler, fract(in.uv * u.dither_scale)).r * 2.0 - 1.0;

    let dx = length(rc) - length(lc);
    let dy = length(tc) - length(bc);
    let n = normalize(vec3<f32>(dx, dy, length(t)));
    let diffuse = clamp(dot(n, vec3<f32>(0.0, 0.0, 1.0)) + 0.7, 0.7, 1.0);
    c = select(c, c * diffuse, SHADING);

    if (SUNRAYS) {
        c = c * sunrays;
        bloom = bloom * sunrays;
    }

    if (BLOOM) {
        bloom = bloom + vec3<f32>(noise / 255.0);
        c = c + linear_to_gamma(bloom);
    }

    let a = max(c.r, max(c.g, c.b));
    return vec4<f32>(c, a);
}
"#;
