use crate::detection::DetectionFunctionSet;
use crate::math::MatrixHelper;
use crate::model::fit::{FitOptions, FittedModel, LambdaChoice, PenalizedIrls, SpatialModelFitter};
use crate::prelude::{DsmError, DsmResult};
use crate::telemetry::StageLog;
use ndarray::{s, Array2};

const DERIVATIVE_STEP: f64 = 1e-5;

/// Refits `model` with detection-function uncertainty folded into its covariance.
///
/// One column per detection parameter holds `∂ log p / ∂θ` on the segments of
/// that function; its coefficient is penalised by the inverse parameter
/// covariance, so the refit coefficient covariance carries the detection
/// uncertainty. The smoothing parameter stays at the original fit's value.
pub fn propagate_detection_variance(
    model: &FittedModel,
    detection: &DetectionFunctionSet,
    options: &FitOptions,
) -> DsmResult<FittedModel> {
    let log = StageLog::new("varprop");
    log.warn("no new data supplied; propagating over the fitting segments");
    if model.extra_columns > 0 {
        return Err(DsmError::InvalidInput(format!(
            "model {} already carries propagated detection variance",
            model.label()
        )));
    }

    let data = &model.data;
    let n = data.rows();
    let p = data.columns();
    let q = detection.parameter_count();
    if q == 0 {
        log.record("detection functions have no parameters; returning the original fit");
        return Ok(model.clone());
    }

    let mut derivative_columns = Array2::<f64>::zeros((n, q));
    let mut prior_precision = Array2::<f64>::zeros((q, q));
    let mut column = 0;
    for (ddf_index, function) in detection.iter() {
        let theta = function.parameters();
        if theta.is_empty() {
            continue;
        }
        let covariance = function.parameter_covariance().ok_or_else(|| {
            DsmError::InvalidInput(format!(
                "detection function {} has parameters but no covariance",
                ddf_index
            ))
        })?;
        let precision = MatrixHelper::invert_spd(covariance.view())?;
        MatrixHelper::embed_block(&mut prior_precision, precision.view(), column);

        for j in 0..theta.len() {
            let mut up = theta.to_vec();
            let mut down = theta.to_vec();
            up[j] += DERIVATIVE_STEP;
            down[j] -= DERIVATIVE_STEP;
            let derivative = (function.probability_at(&up).ln()
                - function.probability_at(&down).ln())
                / (2.0 * DERIVATIVE_STEP);
            for (row, index) in data.ddf_index.iter().enumerate() {
                if *index == ddf_index {
                    derivative_columns[[row, column + j]] = derivative;
                }
            }
        }
        column += theta.len();
    }

    let mut augmented = data.clone();
    let mut design = Array2::<f64>::zeros((n, p + q));
    design.slice_mut(s![.., ..p]).assign(&data.design);
    design.slice_mut(s![.., p..]).assign(&derivative_columns);
    augmented.design = design;

    let mut smooth_penalty = Array2::<f64>::zeros((p + q, p + q));
    smooth_penalty
        .slice_mut(s![..p, ..p])
        .assign(&data.smooth_penalty);
    augmented.smooth_penalty = smooth_penalty;

    let mut fixed = Array2::<f64>::zeros((p + q, p + q));
    if let Some(existing) = &data.fixed_penalty {
        fixed.slice_mut(s![..p, ..p]).assign(existing);
    }
    MatrixHelper::embed_block(&mut fixed, prior_precision.view(), p);
    augmented.fixed_penalty = Some(fixed);

    let refit_options = FitOptions {
        lambda: LambdaChoice::Fixed(model.lambda),
        ..options.clone()
    };
    let refit = PenalizedIrls::new(refit_options).fit(model.spec, &model.basis, augmented, q)?;
    log.record(&format!(
        "{}: {} detection parameters propagated",
        refit.label(),
        q
    ));
    Ok(refit)
}
