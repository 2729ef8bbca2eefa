//! Projection Transverse Mercator (séries de Krüger à l'ordre 6)
//!
//! Précision sub-millimétrique à quelques degrés du méridien central,
//! largement suffisante pour le Portugal continental.
//!
//! Projection supportée:
//! - PT-TM06/ETRS89 (EPSG:3763)

use super::ellipsoid::GRS80;
use super::Geographic;
use anyhow::{bail, Result};

/// Paramètres d'une projection Transverse Mercator
pub struct TransverseMercator {
    /// Longitude du méridien central (radians)
    lon0: f64,
    /// Facteur d'échelle
    k0: f64,
    /// False easting
    x0: f64,
    /// False northing
    y0: f64,
    e: f64,
    e2: f64,
    /// Rayon rectifiant
    a_rect: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
    /// ξ de la latitude d'origine
    xi0: f64,
}

impl TransverseMercator {
    /// PT-TM06/ETRS89 (EPSG:3763)
    ///
    /// Origine 39°40'05.73"N 8°07'59.19"W, k0 = 1, FE = FN = 0
    pub fn pt_tm06() -> Self {
        Self::new(39.668_258_333_333_33, -8.133_108_333_333_33, 1.0, 0.0, 0.0)
    }

    /// Crée une projection sur GRS80 (degrés pour lat0/lon0)
    pub fn new(lat0_deg: f64, lon0_deg: f64, k0: f64, x0: f64, y0: f64) -> Self {
        let n = GRS80::N;
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;
        let n5 = n4 * n;
        let n6 = n5 * n;

        let a_rect = GRS80::A / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0 - 127.0 * n5 / 288.0
                + 7891.0 * n6 / 37800.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0 + 281.0 * n5 / 630.0
                - 1983433.0 * n6 / 1935360.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0 + 15061.0 * n5 / 26880.0
                + 167603.0 * n6 / 181440.0,
            49561.0 * n4 / 161280.0 - 179.0 * n5 / 168.0 + 6601661.0 * n6 / 7257600.0,
            34729.0 * n5 / 80640.0 - 3418889.0 * n6 / 1995840.0,
            212378941.0 * n6 / 319334400.0,
        ];

        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0 - 81.0 * n5 / 512.0
                + 96199.0 * n6 / 604800.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0 + 46.0 * n5 / 105.0
                - 1118711.0 * n6 / 3870720.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0 - 209.0 * n5 / 4480.0 + 5569.0 * n6 / 90720.0,
            4397.0 * n4 / 161280.0 - 11.0 * n5 / 504.0 - 830251.0 * n6 / 7257600.0,
            4583.0 * n5 / 161280.0 - 108847.0 * n6 / 3991680.0,
            20648693.0 * n6 / 638668800.0,
        ];

        let e2 = GRS80::E2;
        let e = e2.sqrt();

        let mut tm = Self {
            lon0: lon0_deg.to_radians(),
            k0,
            x0,
            y0,
            e,
            e2,
            a_rect,
            alpha,
            beta,
            xi0: 0.0,
        };

        // ξ à la latitude d'origine (η = 0)
        let taup0 = tm.conformal_tau(lat0_deg.to_radians().tan());
        let xip0 = taup0.atan();
        tm.xi0 = xip0
            + tm
                .alpha
                .iter()
                .enumerate()
                .map(|(j, a)| a * (2.0 * (j as f64 + 1.0) * xip0).sin())
                .sum::<f64>();
        tm
    }

    /// Coordonnées géographiques → projetées (mètres)
    pub fn forward(&self, geo: Geographic) -> Result<(f64, f64)> {
        if !geo.lon.is_finite() || !geo.lat.is_finite() {
            bail!("Non-finite geographic coordinate");
        }

        let lam = geo.lon - self.lon0;
        let taup = self.conformal_tau(geo.lat.tan());
        let (sin_lam, cos_lam) = lam.sin_cos();

        let xip = taup.atan2(cos_lam);
        let etap = (sin_lam / taup.hypot(cos_lam)).asinh();

        let mut xi = xip;
        let mut eta = etap;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += a * (k * xip).sin() * (k * etap).cosh();
            eta += a * (k * xip).cos() * (k * etap).sinh();
        }

        let x = self.x0 + self.k0 * self.a_rect * eta;
        let y = self.y0 + self.k0 * self.a_rect * (xi - self.xi0);
        Ok((x, y))
    }

    /// Coordonnées projetées (mètres) → géographiques
    pub fn inverse(&self, x: f64, y: f64) -> Result<Geographic> {
        if !x.is_finite() || !y.is_finite() {
            bail!("Non-finite projected coordinate ({}, {})", x, y);
        }

        let xi = (y - self.y0) / (self.k0 * self.a_rect) + self.xi0;
        let eta = (x - self.x0) / (self.k0 * self.a_rect);

        let mut xip = xi;
        let mut etap = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xip -= b * (k * xi).sin() * (k * eta).cosh();
            etap -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let s = etap.sinh();
        let c = xip.cos();
        let r = s.hypot(c);
        let taup = xip.sin() / r;
        let lam = s.atan2(c);

        let tau = self.geodetic_tau(taup);
        Ok(Geographic::new(self.lon0 + lam, tau.atan()))
    }

    /// tan(latitude géodésique) → tan(latitude conforme)
    fn conformal_tau(&self, tau: f64) -> f64 {
        let sigma = (self.e * (self.e * tau / 1f64.hypot(tau)).atanh()).sinh();
        tau * 1f64.hypot(sigma) - sigma * 1f64.hypot(tau)
    }

    /// tan(latitude conforme) → tan(latitude géodésique), par Newton
    fn geodetic_tau(&self, taup: f64) -> f64 {
        let e2m = 1.0 - self.e2;
        let mut tau = taup / e2m;

        for _ in 0..5 {
            let taupa = self.conformal_tau(tau);
            let dtau = (taup - taupa) * (1.0 + e2m * tau * tau)
                / (e2m * 1f64.hypot(tau) * 1f64.hypot(taupa));
            tau += dtau;
            if dtau.abs() < 1e-14 * tau.abs().max(1.0) {
                break;
            }
        }
        tau
    }
}
