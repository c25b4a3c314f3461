//! 每个内核的 WGSL 都必须能被 naga 解析并通过校验（无需 GPU）

use stable_fluid::render::kernels::{source, KernelId};

fn parse(kernel: KernelId) -> naga::Module {
    let wgsl = source(kernel);
    naga::front::wgsl::parse_str(&wgsl).unwrap_or_else(|e| {
        panic!(
            "{} failed to parse:\n{}",
            kernel.name(),
            e.emit_to_string(&wgsl)
        )
    })
}

#[test]
fn test_all_kernels_validate() {
    for kernel in KernelId::ALL {
        let module = parse(kernel);
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        if let Err(e) = validator.validate(&module) {
            panic!("{} failed validation: {:?}", kernel.name(), e);
        }
    }
}

#[test]
fn test_entry_points_match_contracts() {
    for kernel in KernelId::ALL {
        let module = parse(kernel);
        let contract = kernel.contract();
        let names: Vec<&str> = module.entry_points.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"vs_fullscreen"), "{} has no vertex stage", kernel.name());
        assert!(
            names.contains(&contract.entry),
            "{} is missing entry point {}",
            kernel.name(),
            contract.entry
        );
    }
}

#[test]
fn test_declared_overrides_exist() {
    for kernel in KernelId::ALL {
        let module = parse(kernel);
        for name in kernel.contract().overrides {
            assert!(
                module
                    .overrides
                    .iter()
                    .any(|(_, o)| o.name.as_deref() == Some(*name)),
                "{} does not declare override {}",
                kernel.name(),
                name
            );
        }
    }
}

#[test]
fn test_texture_slots_match_bindings() {
    for kernel in KernelId::ALL {
        let module = parse(kernel);
        for (index, slot) in kernel.contract().textures.iter().enumerate() {
            let binding = module
                .global_variables
                .iter()
                .find(|(_, var)| var.name.as_deref() == Some(*slot))
                .and_then(|(_, var)| var.binding.clone())
                .unwrap_or_else(|| panic!("{} has no global {}", kernel.name(), slot));
            assert_eq!(binding.group, 0);
            assert_eq!(binding.binding, 2 + index as u32, "{}::{}", kernel.name(), slot);
        }
    }
}
