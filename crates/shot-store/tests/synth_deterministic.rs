use shot_store::synth::{MODULATOR_PATH, SIGNAL_PATH};
use shot_store::SynthSpec;

#[test]
fn generation_is_reproducible_per_file() {
    let small = SynthSpec {
        files: 1,
        ..SynthSpec::default()
    };
    let large = SynthSpec {
        files: 4,
        ..SynthSpec::default()
    };
    assert_eq!(
        small.generate_file(0).unwrap(),
        large.generate().unwrap()[0].1
    );
}

#[test]
fn shot_indices_are_contiguous_across_files() {
    let spec = SynthSpec {
        first_shot: 500,
        ..SynthSpec::default()
    };
    let files = spec.generate().unwrap();
    let first = files[0].1.shot_indices("bunches").unwrap();
    let second = files[1].1.shot_indices("bunches").unwrap();
    assert_eq!(first[0], 500);
    assert_eq!(second[0], first[99] + 1);
}

#[test]
fn modulator_reference_is_low_at_the_off_phase() {
    let spec = SynthSpec::default();
    let file = spec.generate_file(0).unwrap();
    let shots = file.shot_indices("bunches").unwrap();
    let reference = file.numeric(MODULATOR_PATH).unwrap();
    for (shot, value) in shots.iter().zip(reference.data()) {
        if shot.rem_euclid(spec.modulator_period) == spec.modulator_offset {
            assert!(*value < 0.5);
        } else {
            assert!(*value > 0.5);
        }
    }
    assert_eq!(file.numeric(SIGNAL_PATH).unwrap().shape(), &[100]);
}
