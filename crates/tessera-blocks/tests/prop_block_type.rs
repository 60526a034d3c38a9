use proptest::prelude::*;
use tessera_blocks::BlockType;

proptest! {
    #[test]
    fn plants_are_transparent_and_passable(id in 17i32..=31) {
        let b = BlockType(id);
        prop_assert!(b.is_plant());
        prop_assert!(b.is_transparent());
        prop_assert!(!b.is_obstacle());
    }

    #[test]
    fn solid_materials_block_and_hide_faces(id in prop_oneof![1i32..=9, 11i32..=14, 16i32..=16, 32i32..=64]) {
        let b = BlockType(id);
        prop_assert!(!b.is_plant());
        prop_assert!(!b.is_transparent());
        prop_assert!(b.is_obstacle());
    }

    #[test]
    fn everything_but_air_and_plants_is_an_obstacle(id in -1i32..=64) {
        let b = BlockType(id);
        prop_assert_eq!(b.is_obstacle(), id != 0 && !(17..=31).contains(&id));
    }
}
