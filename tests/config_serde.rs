use tess_sieve::prelude::*;

#[test]
fn config_json_round_trip() {
    let cfg = TessConfig::new(Aabb::new([-1.0; 3], [1.0, 2.0, 3.0]))
        .with_wrap(true)
        .with_volume_range(1e-4, 0.5)
        .with_bins(20, 40);
    let json = serde_json::to_string(&cfg).unwrap();
    let back: TessConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
    assert!(back.validate().is_ok());
}

#[test]
fn invalid_configs_are_rejected() {
    let flat = TessConfig::new(Aabb::new([0.0; 3], [1.0, 0.0, 1.0]));
    assert!(matches!(flat.validate(), Err(TessError::InvalidConfig(_))));
    let inverted = TessConfig::default().with_volume_range(2.0, 1.0);
    assert!(matches!(inverted.validate(), Err(TessError::InvalidConfig(_))));
    let no_bins = TessConfig::default().with_bins(0, 10);
    assert!(no_bins.validate().is_err());
}

#[test]
fn block_survives_bincode() {
    let mut b = Block::new(2, Aabb::unit(), vec![[0.1, 0.2, 0.3], [0.5, 0.5, 0.5]]);
    b.flags = vec![true, false];
    let back = Block::from_bytes(&b.to_bytes().unwrap()).unwrap();
    assert_eq!(back, b);
    assert!(Block::from_bytes(&[1, 2, 3]).is_err());
}
