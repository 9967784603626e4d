//! Robot-state interpolation between bracketing records

use crate::time::Timestamp;
use crate::types::RobotState;

/// Extrapolation is clamped to one prediction step to avoid runaway drift
/// and quaternion singularities near the pole.
const MAX_EXTRAPOLATION_SECS: f64 = 0.1;

pub struct StateInterpolator;

impl StateInterpolator {
    /// Normalized position of `t_query` between `t1` and `t2`, clamped to [0, 1].
    pub fn alpha(t1: Timestamp, t2: Timestamp, t_query: Timestamp) -> f64 {
        let total = t2.as_micros() - t1.as_micros();
        if total <= 0 {
            return 0.0;
        }
        let part = t_query.as_micros() - t1.as_micros();
        (part as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// Linear interpolation for positions and velocities, SLERP for orientation.
    pub fn interpolate(s1: &RobotState, s2: &RobotState, t_query: Timestamp) -> RobotState {
        let alpha = Self::alpha(s1.timestamp, s2.timestamp, t_query);

        RobotState {
            timestamp: t_query,
            joint_pos: &s1.joint_pos + (&s2.joint_pos - &s1.joint_pos) * alpha,
            joint_vel: &s1.joint_vel + (&s2.joint_vel - &s1.joint_vel) * alpha,
            ee_pos: s1.ee_pos + (s2.ee_pos - s1.ee_pos) * alpha,
            ee_rot: s1.ee_rot.slerp(&s2.ee_rot, alpha),
            imu_acc: s1.imu_acc + (s2.imu_acc - s1.imu_acc) * alpha,
            ee_force: s1.ee_force + (s2.ee_force - s1.ee_force) * alpha,
            head_yaw: s1.head_yaw + (s2.head_yaw - s1.head_yaw) * alpha as f32,
            head_pitch: s1.head_pitch + (s2.head_pitch - s1.head_pitch) * alpha as f32,
        }
    }

    /// One constant-velocity prediction step past the latest record.
    ///
    /// Orientation is held; joint and Cartesian positions advance by their
    /// last known velocities for a clamped `dt`.
    pub fn extrapolate(last: &RobotState, t_query: Timestamp) -> RobotState {
        let dt = t_query
            .seconds_since(last.timestamp)
            .clamp(0.0, MAX_EXTRAPOLATION_SECS);

        let mut out = last.clone();
        out.timestamp = last.timestamp.add_secs(dt);
        out.joint_pos = &last.joint_pos + &last.joint_vel * dt;
        // ee velocity is not part of the record; hold ee_pos and orientation.
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DVector, UnitQuaternion, Vector3};

    fn state(micros: i64, x: f64) -> RobotState {
        let mut rs = RobotState::zeroed(2, Timestamp::from_micros(micros));
        rs.ee_pos = Vector3::new(x, 0.0, 0.0);
        rs.joint_pos = DVector::from_vec(vec![x, 2.0 * x]);
        rs
    }

    #[test]
    fn test_alpha_clamps() {
        let t1 = Timestamp::from_micros(100);
        let t2 = Timestamp::from_micros(200);
        assert_eq!(StateInterpolator::alpha(t1, t2, Timestamp::from_micros(50)), 0.0);
        assert_eq!(StateInterpolator::alpha(t1, t2, Timestamp::from_micros(300)), 1.0);
        assert!((StateInterpolator::alpha(t1, t2, Timestamp::from_micros(150)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_alpha_degenerate_interval() {
        let t = Timestamp::from_micros(100);
        assert_eq!(StateInterpolator::alpha(t, t, Timestamp::from_micros(150)), 0.0);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = state(0, 0.0);
        let b = state(1_000_000, 1.0);
        let mid = StateInterpolator::interpolate(&a, &b, Timestamp::from_micros(500_000));
        assert!((mid.ee_pos.x - 0.5).abs() < 1e-9);
        assert!((mid.joint_pos[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_slerp_orientation() {
        let mut a = state(0, 0.0);
        let mut b = state(1_000_000, 0.0);
        a.ee_rot = UnitQuaternion::identity();
        b.ee_rot = UnitQuaternion::from_euler_angles(0.0, 0.0, 1.0);
        let mid = StateInterpolator::interpolate(&a, &b, Timestamp::from_micros(500_000));
        let (_, _, yaw) = mid.ee_rot.euler_angles();
        assert!((yaw - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_extrapolate_clamped() {
        let mut last = state(0, 0.0);
        last.joint_vel = DVector::from_vec(vec![1.0, 0.0]);
        // Query far past the record: the step is clamped, not proportional.
        let out = StateInterpolator::extrapolate(&last, Timestamp::from_micros(5_000_000));
        assert!((out.joint_pos[0] - 0.1).abs() < 1e-9);
        assert_eq!(out.ee_rot, last.ee_rot);
    }
}
