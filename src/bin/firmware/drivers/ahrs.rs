use micromath::F32Ext;

/// Mahony complementary filter, gyro + accelerometer.
pub struct Mahony {
    kp: f32,
    ki: f32,
    integral: [f32; 3],
    q: [f32; 4], // w, x, y, z
}

impl Mahony {
    pub fn new(kp: f32, ki: f32) -> Self {
        Self { kp, ki, integral: [0.0; 3], q: [1.0, 0.0, 0.0, 0.0] }
    }

    /// `gyro` in rad/s, `accel` in any unit (normalized here).
    pub fn update(&mut self, dt: f32, gyro: [f32; 3], accel: [f32; 3]) {
        let [q0, q1, q2, q3] = self.q;
        let [mut gx, mut gy, mut gz] = gyro;

        let norm = accel[0] * accel[0] + accel[1] * accel[1] + accel[2] * accel[2];
        if norm > 0.0 {
            let inv = norm.sqrt().recip();
            let (ax, ay, az) = (accel[0] * inv, accel[1] * inv, accel[2] * inv);

            // Gravity as the current estimate sees it, halved.
            let vx = q1 * q3 - q0 * q2;
            let vy = q0 * q1 + q2 * q3;
            let vz = q0 * q0 - 0.5 + q3 * q3;

            let err = [ay * vz - az * vy, az * vx - ax * vz, ax * vy - ay * vx];
            for (i, e) in err.iter().enumerate() {
                self.integral[i] += self.ki * e * dt;
            }
            gx += self.kp * err[0] + self.integral[0];
            gy += self.kp * err[1] + self.integral[1];
            gz += self.kp * err[2] + self.integral[2];
        }

        let h = 0.5 * dt;
        let q = [
            q0 + (-q1 * gx - q2 * gy - q3 * gz) * h,
            q1 + (q0 * gx + q2 * gz - q3 * gy) * h,
            q2 + (q0 * gy - q1 * gz + q3 * gx) * h,
            q3 + (q0 * gz + q1 * gy - q2 * gx) * h,
        ];
        let inv = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt().recip();
        self.q = q.map(|c| c * inv);
    }

    /// `[roll, pitch, yaw]` in radians, yaw in (-π, π].
    pub fn euler(&self) -> [f32; 3] {
        let [q0, q1, q2, q3] = self.q;
        let roll = (2.0 * (q0 * q1 + q2 * q3)).atan2(1.0 - 2.0 * (q1 * q1 + q2 * q2));
        let sinp = (2.0 * (q0 * q2 - q3 * q1)).clamp(-1.0, 1.0);
        let yaw = (2.0 * (q0 * q3 + q1 * q2)).atan2(1.0 - 2.0 * (q2 * q2 + q3 * q3));
        [roll, sinp.asin(), yaw]
    }
}
