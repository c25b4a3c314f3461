//! 核心宏定义

/// 为配置结构体实现 Default trait 的宏
///
/// 使用示例:
/// ```rust
/// use stable_fluid::impl_default;
///
/// struct SunraysSettings {
///     enabled: bool,
///     weight: f32,
/// }
///
/// impl_default!(SunraysSettings {
///     enabled: true,
///     weight: 1.0,
/// });
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    struct SplatDefaults {
        radius: f32,
        force: f32,
    }

    impl_default!(SplatDefaults {
        radius: 0.25,
        force: 6000.0,
    });

    #[test]
    fn test_impl_default() {
        let s = SplatDefaults::default();
        assert_eq!(s.radius, 0.25);
        assert_eq!(s.force, 6000.0);
    }
}
