use crate::{
    crd::{
        preference::{ClockPreferences, MachinePreferences},
        virtual_machine::{Clock, Machine},
    },
    merge::Merge,
};

pub(super) fn apply_clock(preferences: &ClockPreferences, clock: &mut Option<Clock>) {
    let clock = clock.get_or_insert_with(Clock::default);

    if let Some(offset) = &preferences.preferred_clock_offset
        && clock.offset.is_unset()
    {
        clock.offset = offset.clone();
    }
    clock.timer.merge(&preferences.preferred_timer);
}

pub(super) fn apply_machine(preferences: &MachinePreferences, machine: &mut Option<Machine>) {
    machine
        .get_or_insert_with(Machine::default)
        .machine_type
        .merge(&preferences.preferred_machine_type);
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::crd::virtual_machine::{ClockOffset, ClockOffsetUtc, Timer, TimerState};

    fn preferences() -> ClockPreferences {
        serde_yaml::from_str(indoc! {"
            preferredClockOffset:
              utc:
                offsetSeconds: 3600
            preferredTimer:
              hpet:
                present: false
        "})
        .unwrap()
    }

    #[test]
    fn fills_unset_clock() {
        let mut clock = None;
        apply_clock(&preferences(), &mut clock);

        let clock = clock.unwrap();
        assert_eq!(
            clock.offset.utc,
            Some(ClockOffsetUtc {
                offset_seconds: Some(3600)
            })
        );
        assert_eq!(
            clock.timer.and_then(|timer| timer.hpet),
            Some(TimerState {
                present: Some(false),
                tick_policy: None
            })
        );
    }

    #[test]
    fn keeps_target_clock() {
        let mut clock = Some(Clock {
            offset: ClockOffset {
                utc: None,
                timezone: Some("Europe/Berlin".to_owned()),
            },
            timer: Some(Timer::default()),
        });

        apply_clock(&preferences(), &mut clock);

        assert_eq!(
            clock,
            Some(Clock {
                offset: ClockOffset {
                    utc: None,
                    timezone: Some("Europe/Berlin".to_owned()),
                },
                timer: Some(Timer::default()),
            })
        );
    }

    #[test]
    fn machine_type() {
        let preferences = MachinePreferences {
            preferred_machine_type: Some("q35".to_owned()),
        };

        let mut machine = None;
        apply_machine(&preferences, &mut machine);
        assert_eq!(machine.unwrap().machine_type.as_deref(), Some("q35"));

        let mut machine = Some(Machine {
            machine_type: Some("pc-q35-rhel9.2.0".to_owned()),
        });
        apply_machine(&preferences, &mut machine);
        assert_eq!(
            machine.unwrap().machine_type.as_deref(),
            Some("pc-q35-rhel9.2.0")
        );
    }
}
